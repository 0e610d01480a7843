use crate::types::did::Did;
use crate::types::handle::Handle;
use crate::{CowStr, IntoStatic};
use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::SmolStr;
use std::collections::BTreeMap;
use url::Url;

/// DID Document representation with borrowed data where possible.
///
/// Only the fields needed to resolve a PDS service endpoint and cross-check
/// `alsoKnownAs` handles are modeled explicitly. All other fields are
/// captured in `extra_data` for forward compatibility.
///
/// Example
/// ```ignore
/// use atcore_common::types::did_doc::DidDocument;
/// use serde_json::json;
/// let doc: DidDocument<'_> = serde_json::from_value(json!({
///   "id": "did:plc:alice",
///   "alsoKnownAs": ["at://alice.example"],
///   "service": [{"id":"#atproto_pds","type":"AtprotoPersonalDataServer","serviceEndpoint":"https://pds.example"}],
/// })).unwrap();
/// assert_eq!(doc.id.as_str(), "did:plc:alice");
/// assert!(doc.pds_endpoint().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(start_fn = new)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument<'a> {
    /// Document identifier (e.g., `did:plc:...` or `did:web:...`)
    #[serde(borrow)]
    pub id: Did<'a>,

    /// Alternate identifiers for the subject, such as at://<handle>
    #[serde(borrow)]
    pub also_known_as: Option<Vec<CowStr<'a>>>,

    /// Verification methods (keys) for this DID. Captured but not
    /// individually verified: signature checking is out of scope here.
    #[serde(borrow)]
    pub verification_method: Option<Vec<VerificationMethod<'a>>>,

    /// Services associated with this DID (e.g., AtprotoPersonalDataServer)
    #[serde(borrow)]
    pub service: Option<Vec<Service<'a>>>,

    /// Forward‑compatible capture of unmodeled fields
    #[serde(flatten)]
    pub extra_data: BTreeMap<SmolStr, Value>,
}

impl crate::IntoStatic for DidDocument<'_> {
    type Output = DidDocument<'static>;
    fn into_static(self) -> Self::Output {
        DidDocument {
            id: self.id.into_static(),
            also_known_as: self.also_known_as.into_static(),
            verification_method: self.verification_method.into_static(),
            service: self.service.into_static(),
            extra_data: self.extra_data,
        }
    }
}

impl<'a> DidDocument<'a> {
    /// Extract validated handles from `alsoKnownAs` entries like `at://<handle>`.
    pub fn handles(&self) -> Vec<Handle<'static>> {
        self.also_known_as
            .as_ref()
            .map(|v| {
                v.iter()
                    .filter_map(|s| s.strip_prefix("at://"))
                    .filter_map(|h| Handle::new(h).ok())
                    .map(|h| h.into_static())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Extract the AtprotoPersonalDataServer service endpoint as a `Url`.
    ///
    /// Matches by service `type` first; falls back to an `id` ending in
    /// `#atproto_pds` for documents that don't use the canonical type string.
    pub fn pds_endpoint(&self) -> Option<Url> {
        let services = self.service.as_ref()?;
        let by_type = services
            .iter()
            .find(|s| s.r#type.as_ref() == "AtprotoPersonalDataServer");
        let by_id = || services.iter().find(|s| s.id.as_ref().ends_with("#atproto_pds"));
        let service = by_type.or_else(by_id)?;
        match &service.service_endpoint {
            Some(Value::String(s)) => Url::parse(s).ok(),
            Some(Value::Object(obj)) => obj.get("url")?.as_str().and_then(|s| Url::parse(s).ok()),
            _ => None,
        }
    }
}

/// Verification method (key) entry in a DID Document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(start_fn = new)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod<'a> {
    /// Identifier for this key material within the document
    #[serde(borrow)]
    pub id: CowStr<'a>,
    /// Key type (e.g., `Multikey`)
    #[serde(borrow, rename = "type")]
    pub r#type: CowStr<'a>,
    /// Optional controller DID
    #[serde(borrow)]
    pub controller: Option<CowStr<'a>>,
    /// Multikey `publicKeyMultibase` (base58btc)
    #[serde(borrow)]
    pub public_key_multibase: Option<CowStr<'a>>,

    /// Forward‑compatible capture of unmodeled fields
    #[serde(flatten)]
    pub extra_data: BTreeMap<SmolStr, Value>,
}

impl crate::IntoStatic for VerificationMethod<'_> {
    type Output = VerificationMethod<'static>;
    fn into_static(self) -> Self::Output {
        VerificationMethod {
            id: self.id.into_static(),
            r#type: self.r#type.into_static(),
            controller: self.controller.into_static(),
            public_key_multibase: self.public_key_multibase.into_static(),
            extra_data: self.extra_data,
        }
    }
}

/// Service entry in a DID Document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(start_fn = new)]
#[serde(rename_all = "camelCase")]
pub struct Service<'a> {
    /// Service identifier
    #[serde(borrow)]
    pub id: CowStr<'a>,
    /// Service type (e.g., `AtprotoPersonalDataServer`)
    #[serde(borrow, rename = "type")]
    pub r#type: CowStr<'a>,
    /// String or object; we preserve as raw JSON
    #[serde(borrow)]
    pub service_endpoint: Option<Value>,

    /// Forward‑compatible capture of unmodeled fields
    #[serde(flatten)]
    pub extra_data: BTreeMap<SmolStr, Value>,
}

impl crate::IntoStatic for Service<'_> {
    type Output = Service<'static>;
    fn into_static(self) -> Self::Output {
        Service {
            id: self.id.into_static(),
            r#type: self.r#type.into_static(),
            service_endpoint: self.service_endpoint,
            extra_data: self.extra_data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pds_endpoint_by_type() {
        let doc: DidDocument<'_> = serde_json::from_value(json!({
            "id": "did:plc:example",
            "service": [{
                "id": "#atproto_pds",
                "type": "AtprotoPersonalDataServer",
                "serviceEndpoint": "https://pds.example",
            }],
        }))
        .unwrap();
        assert_eq!(doc.pds_endpoint().unwrap().as_str(), "https://pds.example/");
    }

    #[test]
    fn pds_endpoint_falls_back_to_id() {
        let doc: DidDocument<'_> = serde_json::from_value(json!({
            "id": "did:plc:example",
            "service": [{
                "id": "did:plc:example#atproto_pds",
                "type": "SomeOtherServiceType",
                "serviceEndpoint": "https://pds.example",
            }],
        }))
        .unwrap();
        assert_eq!(doc.pds_endpoint().unwrap().as_str(), "https://pds.example/");
    }

    #[test]
    fn handles_extracted_from_also_known_as() {
        let doc: DidDocument<'_> = serde_json::from_value(json!({
            "id": "did:plc:example",
            "alsoKnownAs": ["at://alice.example", "not-an-at-uri"],
        }))
        .unwrap();
        let handles = doc.handles();
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].as_str(), "alice.example");
    }
}
