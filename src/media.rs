//! Photo attachments for photo-type fields and the capture device seam.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;

/// Where a capture comes from. Each source has its own permission step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSource {
    Camera,
    Library,
}

/// One captured photo as reported by the device.
#[derive(Debug, Clone)]
pub struct CapturedAsset {
    pub uri: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: Option<u64>,
}

/// One attachment as tracked by the form session.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaAttachment {
    pub uri: String,
    pub name: String,
    pub mime: String,
    pub size: Option<u64>,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    /// The OS (or device backend) refused access to the source.
    #[error("{0} access denied; check device permissions")]
    PermissionDenied(&'static str),
    #[error("capture failed: {0}")]
    Failed(String),
}

/// Device capability behind photo fields: request permission, then launch a
/// capture that yields at most one asset. `Ok(None)` is a user cancellation.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn ensure_permission(&self, source: CaptureSource) -> Result<(), CaptureError>;
    async fn capture(&self, source: CaptureSource)
    -> Result<Option<CapturedAsset>, CaptureError>;
}

/// Per-field attachment lists for one form session. Lists are fully
/// independent between fields; order is append order.
#[derive(Debug, Clone, Default)]
pub struct MediaStore {
    attachments: HashMap<String, Vec<MediaAttachment>>,
}

impl MediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one capture for a field. Permission is checked first; denial (or a
    /// cancelled capture) leaves the field's list unchanged.
    pub async fn add_media(
        &mut self,
        device: &dyn CaptureDevice,
        field_id: &str,
        source: CaptureSource,
    ) -> Result<bool, CaptureError> {
        device.ensure_permission(source).await?;
        let Some(asset) = device.capture(source).await? else {
            return Ok(false);
        };
        let mime = asset
            .mime_type
            .clone()
            .unwrap_or_else(|| "image/jpeg".to_string());
        let name = asset
            .file_name
            .clone()
            .unwrap_or_else(|| default_file_name(field_id, &mime));
        self.attachments
            .entry(field_id.to_string())
            .or_default()
            .push(MediaAttachment {
                uri: asset.uri,
                name,
                mime,
                size: asset.file_size,
            });
        Ok(true)
    }

    /// Positional removal. An index that is not present is a no-op.
    pub fn remove_media(&mut self, field_id: &str, index: usize) {
        if let Some(list) = self.attachments.get_mut(field_id)
            && index < list.len()
        {
            list.remove(index);
        }
    }

    /// Attachments for one field in append order.
    pub fn for_field(&self, field_id: &str) -> &[MediaAttachment] {
        self.attachments
            .get(field_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn total_count(&self) -> usize {
        self.attachments.values().map(|v| v.len()).sum()
    }
}

/// Default name when the device supplies none: `{field}-{unix_ts}.{ext}`.
fn default_file_name(field_id: &str, mime: &str) -> String {
    format!(
        "{}-{}.{}",
        field_id,
        chrono::Utc::now().timestamp(),
        extension_from_mime(mime)
    )
}

/// File extension from a MIME type, defaulting to jpg.
fn extension_from_mime(mime: &str) -> &str {
    match mime {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/heic" => "heic",
        _ => "jpg",
    }
}

/// Capture device for the terminal: the "library" is the local filesystem
/// (the user types a path), and the camera is unavailable.
pub struct LocalFileDevice {
    /// Path typed by the user for the next library pick, if any.
    pub pending_path: Option<String>,
}

#[async_trait]
impl CaptureDevice for LocalFileDevice {
    async fn ensure_permission(&self, source: CaptureSource) -> Result<(), CaptureError> {
        match source {
            // No camera is reachable from a terminal session.
            CaptureSource::Camera => Err(CaptureError::PermissionDenied("camera")),
            CaptureSource::Library => Ok(()),
        }
    }

    async fn capture(
        &self,
        source: CaptureSource,
    ) -> Result<Option<CapturedAsset>, CaptureError> {
        if source == CaptureSource::Camera {
            return Err(CaptureError::PermissionDenied("camera"));
        }
        let Some(path) = self.pending_path.clone() else {
            return Ok(None);
        };
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| CaptureError::Failed(format!("{path}: {e}")))?;
        let file_name = Path::new(&path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        let mime = file_name.as_deref().map(guess_image_mime);
        Ok(Some(CapturedAsset {
            uri: path,
            file_name,
            mime_type: mime.map(str::to_string),
            file_size: Some(meta.len()),
        }))
    }
}

/// MIME guess from a filename extension, defaulting to jpeg.
fn guess_image_mime(name: &str) -> &'static str {
    let ext = name.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted device for tests: permissions and captures per source.
    struct FakeDevice {
        deny_camera: bool,
        next: Option<CapturedAsset>,
    }

    #[async_trait]
    impl CaptureDevice for FakeDevice {
        async fn ensure_permission(&self, source: CaptureSource) -> Result<(), CaptureError> {
            if source == CaptureSource::Camera && self.deny_camera {
                return Err(CaptureError::PermissionDenied("camera"));
            }
            Ok(())
        }

        async fn capture(
            &self,
            _source: CaptureSource,
        ) -> Result<Option<CapturedAsset>, CaptureError> {
            Ok(self.next.clone())
        }
    }

    fn asset(uri: &str, name: Option<&str>) -> CapturedAsset {
        CapturedAsset {
            uri: uri.into(),
            file_name: name.map(Into::into),
            mime_type: Some("image/png".into()),
            file_size: Some(1024),
        }
    }

    #[tokio::test]
    async fn test_denied_permission_leaves_state_unchanged() {
        let device = FakeDevice {
            deny_camera: true,
            next: Some(asset("file:///a.png", Some("a.png"))),
        };
        let mut store = MediaStore::new();
        let err = store
            .add_media(&device, "photos", CaptureSource::Camera)
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::PermissionDenied(_)));
        assert!(store.for_field("photos").is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_capture_is_not_an_error() {
        let device = FakeDevice {
            deny_camera: false,
            next: None,
        };
        let mut store = MediaStore::new();
        let added = store
            .add_media(&device, "photos", CaptureSource::Library)
            .await
            .unwrap();
        assert!(!added);
        assert!(store.for_field("photos").is_empty());
    }

    #[tokio::test]
    async fn test_fields_keep_independent_append_order() {
        let device = FakeDevice {
            deny_camera: false,
            next: Some(asset("file:///a.png", Some("a.png"))),
        };
        let mut store = MediaStore::new();
        store
            .add_media(&device, "before", CaptureSource::Library)
            .await
            .unwrap();
        store
            .add_media(&device, "after", CaptureSource::Library)
            .await
            .unwrap();
        store
            .add_media(&device, "before", CaptureSource::Library)
            .await
            .unwrap();
        assert_eq!(store.for_field("before").len(), 2);
        assert_eq!(store.for_field("after").len(), 1);
        assert_eq!(store.total_count(), 3);
    }

    #[tokio::test]
    async fn test_default_name_built_from_field_and_mime() {
        let device = FakeDevice {
            deny_camera: false,
            next: Some(asset("file:///x", None)),
        };
        let mut store = MediaStore::new();
        store
            .add_media(&device, "roof", CaptureSource::Library)
            .await
            .unwrap();
        let name = &store.for_field("roof")[0].name;
        assert!(name.starts_with("roof-"), "got {name}");
        assert!(name.ends_with(".png"), "got {name}");
    }

    #[test]
    fn test_remove_out_of_range_is_noop() {
        let mut store = MediaStore::new();
        store.remove_media("photos", 0);
        assert!(store.for_field("photos").is_empty());
    }
}
