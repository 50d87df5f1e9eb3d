//! Encoded tile image with an optional expiry.

use std::time::{Duration, SystemTime};

use bytes::Bytes;

/// An encoded tile image as produced by a backend.
///
/// The payload is kept as opaque bytes (PNG, JPEG, ...); decoding belongs to
/// the rendering layer. Cloning is cheap since [`Bytes`] is reference counted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileImage {
    data: Bytes,
    expires: Option<SystemTime>,
}

impl TileImage {
    /// Creates an image that never expires.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            expires: None,
        }
    }

    /// Sets the instant after which the image should be revalidated.
    pub fn with_expiry(mut self, expires: SystemTime) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Sets the expiry relative to now.
    pub fn with_max_age(self, max_age: Duration) -> Self {
        self.with_expiry(SystemTime::now() + max_age)
    }

    /// The encoded payload.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// When the image should be revalidated, if ever.
    pub fn expires(&self) -> Option<SystemTime> {
        self.expires
    }

    /// Whether the image is past its expiry at `now`.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expires.is_some_and(|expires| now >= expires)
    }

    /// Whether the image is past its expiry.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_never_expires() {
        let image = TileImage::new(vec![1, 2, 3]);
        assert_eq!(image.len(), 3);
        assert!(image.expires().is_none());
        assert!(!image.is_expired());
    }

    #[test]
    fn test_expiry_in_past() {
        let past = SystemTime::now() - Duration::from_secs(10);
        let image = TileImage::new(vec![1]).with_expiry(past);
        assert!(image.is_expired());
    }

    #[test]
    fn test_max_age_in_future() {
        let image = TileImage::new(vec![1]).with_max_age(Duration::from_secs(3600));
        assert!(!image.is_expired());
        let later = SystemTime::now() + Duration::from_secs(7200);
        assert!(image.is_expired_at(later));
    }
}
