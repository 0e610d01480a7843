//! Conversion from a borrowed, lifetime-parameterized value into its owned,
//! `'static` counterpart.
//!
//! Most types in this crate borrow from the buffer they were deserialized
//! from (`CowStr<'a>`, `Did<'a>`, ...). `IntoStatic` is how callers detach a
//! value from that buffer when it needs to outlive the response, e.g. to
//! store it in a vault record or hand it to a spawned task.

/// Convert a borrowing value into its owned `'static` form.
pub trait IntoStatic {
    /// The `'static` counterpart of `Self`.
    type Output: 'static;

    /// Consume `self`, cloning any borrowed data so the result is `'static`.
    fn into_static(self) -> Self::Output;
}

macro_rules! impl_into_static_identity {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoStatic for $ty {
                type Output = $ty;
                #[inline]
                fn into_static(self) -> Self::Output {
                    self
                }
            }
        )*
    };
}

impl_into_static_identity!(
    (),
    bool,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    f32,
    f64,
    String,
    chrono::DateTime<chrono::FixedOffset>,
    url::Url,
    serde_json::Value,
);

impl<T: IntoStatic> IntoStatic for Option<T> {
    type Output = Option<T::Output>;

    #[inline]
    fn into_static(self) -> Self::Output {
        self.map(IntoStatic::into_static)
    }
}

impl<T: IntoStatic> IntoStatic for Vec<T> {
    type Output = Vec<T::Output>;

    #[inline]
    fn into_static(self) -> Self::Output {
        self.into_iter().map(IntoStatic::into_static).collect()
    }
}

impl<T: IntoStatic> IntoStatic for Box<T> {
    type Output = Box<T::Output>;

    #[inline]
    fn into_static(self) -> Self::Output {
        Box::new((*self).into_static())
    }
}

impl<K, V> IntoStatic for std::collections::BTreeMap<K, V>
where
    K: Ord,
    V: IntoStatic,
{
    type Output = std::collections::BTreeMap<K, V::Output>;

    #[inline]
    fn into_static(self) -> Self::Output {
        self.into_iter()
            .map(|(k, v)| (k, v.into_static()))
            .collect()
    }
}
