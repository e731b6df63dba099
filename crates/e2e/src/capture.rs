//! Screenshot capture and video finalization
//!
//! Nothing in this module can change a test's outcome. Each step logs what
//! went wrong and reports it as an absent artifact.

use std::path::{Path, PathBuf};

use base64::Engine as _;
use playrun_common::config::CaptureConfig;
use playrun_common::CapturePolicy;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::E2eResult;
use crate::record::{Attachment, ResultRecord};
use crate::scope::TestResourceScope;

const DEFAULT_VIDEO_EXT: &str = "webm";

/// Encoded screenshot bytes; empty when capture failed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Screenshot {
    bytes: Vec<u8>,
    path: Option<PathBuf>,
}

impl Screenshot {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes, path: None }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Where the screenshot was written, if it was persisted
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// `data:image/png;base64,...`, or an empty string when there is no image
    pub fn data_uri(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }

    pub fn sha256(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        hex::encode(hasher.finalize())
    }

    /// Write the image to `dir/<name>_<timestamp>.png`
    pub fn persist(&mut self, dir: &Path, name: &str) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("{}_{}.png", name, stamp));
        std::fs::write(&path, &self.bytes)?;
        self.path = Some(path.clone());
        Ok(path)
    }
}

/// List an unpersisted screenshot on `record`: stored next to it in `dir`,
/// or inline as a data URI when that write fails
pub fn attach_screenshot(record: &mut ResultRecord, dir: &Path, test_id: &str, shot: &Screenshot) {
    let name = format!("{} screenshot", test_id);
    if let Err(e) = record.attach_bytes(dir, &name, shot.bytes(), "image/png", "png") {
        warn!("Could not store screenshot for {} ({}), embedding it", test_id, e);
        record
            .attachments
            .push(Attachment::new(name, shot.data_uri(), "image/png"));
    }
}

/// Full-page screenshot of the scope's page. Never fails: problems are
/// logged and yield an empty screenshot.
pub fn capture_screenshot(scope: &TestResourceScope) -> Screenshot {
    let page = match scope.page() {
        Ok(page) => page,
        Err(e) => {
            warn!("Failed to take screenshot for {}: {}", scope.test_id(), e);
            return Screenshot::empty();
        }
    };

    match page.screenshot(true) {
        Ok(bytes) if bytes.is_empty() => {
            warn!("Screenshot capture returned empty data for {}", scope.test_id());
            Screenshot::empty()
        }
        Ok(bytes) => {
            let shot = Screenshot::from_bytes(bytes);
            debug!(
                "Screenshot captured for {} ({} bytes, sha256 {})",
                scope.test_id(),
                shot.len(),
                shot.sha256()
            );
            shot
        }
        Err(e) => {
            warn!("Failed to take screenshot for {}: {}", scope.test_id(), e);
            Screenshot::empty()
        }
    }
}

/// What happened to a test's recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoOutcome {
    /// The page had no video handle
    NotRecorded,
    /// The engine reported a path, but no file was there
    Missing { expected: PathBuf },
    /// Renamed and referenced in the report
    Attached { path: PathBuf, size: u64 },
    /// Renamed, but the capture policy leaves it out of the report
    Unreferenced { path: PathBuf, size: u64 },
    /// Renamed, but too small to hold any frames
    TooSmall { path: PathBuf, size: u64 },
    /// The rename/copy failed
    Failed { reason: String },
}

impl VideoOutcome {
    /// Path of the video referenced in the report
    pub fn attached_path(&self) -> Option<&Path> {
        match self {
            VideoOutcome::Attached { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Path of the finalized file on disk, referenced or not
    pub fn final_path(&self) -> Option<&Path> {
        match self {
            VideoOutcome::Attached { path, .. }
            | VideoOutcome::Unreferenced { path, .. }
            | VideoOutcome::TooSmall { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Rename the scope's recording to `<video dir>/<test_id>.<ext>` and decide,
/// from `capture.video` and the outcome, whether the report references it.
///
/// The scope must be closed first; the engine only finalizes the file then.
pub fn finalize_video(
    scope: &TestResourceScope,
    capture: &CaptureConfig,
    test_passed: bool,
) -> VideoOutcome {
    finalize_recording(
        scope.recorded_video(),
        scope.video_dir(),
        scope.test_id(),
        capture.video,
        test_passed,
        capture.min_video_bytes,
    )
}

/// Path-level form of [`finalize_video`]
pub fn finalize_recording(
    source: Option<&Path>,
    video_dir: &Path,
    test_id: &str,
    policy: CapturePolicy,
    test_passed: bool,
    min_video_bytes: u64,
) -> VideoOutcome {
    let Some(source) = source else {
        debug!("No video recorded for {}", test_id);
        return VideoOutcome::NotRecorded;
    };

    if !source.exists() {
        info!("Video file not found: {}", source.display());
        return VideoOutcome::Missing {
            expected: source.to_path_buf(),
        };
    }

    let ext = source
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_VIDEO_EXT.to_string());
    let dest = video_dir.join(format!("{}.{}", test_id, ext));

    if let Err(e) = move_replacing(source, &dest) {
        warn!("Video handling failed for {}: {}", test_id, e);
        return VideoOutcome::Failed {
            reason: e.to_string(),
        };
    }

    let size = match std::fs::metadata(&dest) {
        Ok(meta) => meta.len(),
        Err(e) => {
            warn!("Could not stat video {}: {}", dest.display(), e);
            return VideoOutcome::Failed {
                reason: e.to_string(),
            };
        }
    };

    if !policy.keeps(test_passed) {
        debug!("Video kept on disk only ({} policy): {}", policy, dest.display());
        return VideoOutcome::Unreferenced { path: dest, size };
    }

    if size <= min_video_bytes {
        info!("Skipping video - too small ({} bytes): {}", size, dest.display());
        return VideoOutcome::TooSmall { path: dest, size };
    }

    info!("Video saved: {} ({} bytes)", dest.display(), size);
    VideoOutcome::Attached { path: dest, size }
}

/// Move `src` to `dest`, removing a stale `dest` first. Falls back to
/// copy-then-delete when a rename is not possible (e.g. across devices).
fn move_replacing(src: &Path, dest: &Path) -> std::io::Result<()> {
    if src == dest {
        return Ok(());
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if dest.exists() {
        debug!("Replacing stale video {}", dest.display());
        std::fs::remove_file(dest)?;
    }

    if let Err(rename_err) = std::fs::rename(src, dest) {
        debug!("Rename failed ({}), copying instead", rename_err);
        std::fs::copy(src, dest)?;
        if let Err(e) = std::fs::remove_file(src) {
            warn!("Could not remove source video {}: {}", src.display(), e);
        }
    }
    Ok(())
}

/// Diagnostics gathered for one finished test
#[derive(Debug, Clone)]
pub struct ArtifactRecord {
    pub test_id: String,
    pub screenshot: Option<Screenshot>,
    pub video: VideoOutcome,
}

impl ArtifactRecord {
    /// Artifacts the report should reference
    pub fn attachments(&self) -> Vec<Attachment> {
        let mut out = Vec::new();
        if let Some(path) = self.screenshot.as_ref().and_then(|s| s.path()) {
            out.push(Attachment::new(
                format!("{} screenshot", self.test_id),
                path.to_string_lossy(),
                "image/png",
            ));
        }
        if let Some(path) = self.video.attached_path() {
            out.push(Attachment::new(
                format!("{} video", self.test_id),
                path.to_string_lossy(),
                "video/webm",
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_video(path: &Path, size: usize) {
        std::fs::write(path, vec![7u8; size]).unwrap();
    }

    #[test]
    fn test_rename_to_test_id() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("a1b2c3.webm");
        write_video(&raw, 4096);

        let outcome = finalize_recording(
            Some(&raw),
            dir.path(),
            "tests_ui_cart__add",
            CapturePolicy::Always,
            true,
            1024,
        );

        let expected = dir.path().join("tests_ui_cart__add.webm");
        assert_eq!(
            outcome,
            VideoOutcome::Attached {
                path: expected.clone(),
                size: 4096
            }
        );
        assert!(!raw.exists());
        assert!(expected.exists());
    }

    #[test]
    fn test_stale_destination_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("t1.webm");
        write_video(&stale, 50_000);
        let raw = dir.path().join("fresh.webm");
        write_video(&raw, 3000);

        let outcome =
            finalize_recording(Some(&raw), dir.path(), "t1", CapturePolicy::Always, false, 1024);

        assert_eq!(outcome.final_path(), Some(stale.as_path()));
        assert_eq!(std::fs::metadata(&stale).unwrap().len(), 3000);
    }

    #[test]
    fn test_on_failure_policy_with_passing_test() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.webm");
        write_video(&raw, 8000);

        let outcome =
            finalize_recording(Some(&raw), dir.path(), "t2", CapturePolicy::OnFailure, true, 1024);

        assert!(matches!(outcome, VideoOutcome::Unreferenced { .. }));
        assert!(dir.path().join("t2.webm").exists());
        assert_eq!(outcome.attached_path(), None);
    }

    #[test]
    fn test_tiny_video_is_not_attached() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.webm");
        write_video(&raw, 1024);

        let outcome =
            finalize_recording(Some(&raw), dir.path(), "t3", CapturePolicy::Always, false, 1024);

        assert!(matches!(outcome, VideoOutcome::TooSmall { size: 1024, .. }));
    }

    #[test]
    fn test_missing_and_absent_recordings() {
        let dir = tempfile::tempdir().unwrap();
        let ghost = dir.path().join("ghost.webm");

        assert_eq!(
            finalize_recording(None, dir.path(), "t4", CapturePolicy::Always, false, 1024),
            VideoOutcome::NotRecorded
        );
        assert!(matches!(
            finalize_recording(Some(&ghost), dir.path(), "t4", CapturePolicy::Always, false, 1024),
            VideoOutcome::Missing { .. }
        ));
    }

    #[test]
    fn test_screenshot_encoding() {
        let shot = Screenshot::from_bytes(vec![0x89, b'P', b'N', b'G']);
        assert_eq!(shot.data_uri(), "data:image/png;base64,iVBORw==");
        assert_eq!(shot.sha256().len(), 64);
        assert_eq!(Screenshot::empty().data_uri(), "");
    }

    #[test]
    fn test_screenshot_attached_next_to_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut record = ResultRecord::new(&crate::identity::TestIdentity::new("tests/ui/a.rs::b"));
        attach_screenshot(&mut record, dir.path(), "t6", &Screenshot::from_bytes(vec![1, 2, 3]));

        assert_eq!(record.attachments.len(), 1);
        let source = &record.attachments[0].source;
        assert!(source.ends_with("-attachment.png"));
        assert_eq!(std::fs::read(dir.path().join(source)).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_screenshot_inlined_when_results_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("results");
        std::fs::write(&blocked, b"not a directory").unwrap();
        let mut record = ResultRecord::new(&crate::identity::TestIdentity::new("tests/ui/a.rs::b"));

        let shot = Screenshot::from_bytes(vec![0x89, b'P', b'N', b'G']);
        attach_screenshot(&mut record, &blocked, "t7", &shot);

        assert_eq!(record.attachments.len(), 1);
        assert_eq!(record.attachments[0].name, "t7 screenshot");
        assert_eq!(record.attachments[0].source, "data:image/png;base64,iVBORw==");
        assert_eq!(record.attachments[0].mime_type, "image/png");
    }

    #[test]
    fn test_attachments_only_referenced() {
        let record = ArtifactRecord {
            test_id: "t5".to_string(),
            screenshot: Some(Screenshot::from_bytes(vec![1, 2, 3])),
            video: VideoOutcome::Unreferenced {
                path: PathBuf::from("reports/videos/master/t5.webm"),
                size: 9000,
            },
        };
        assert!(record.attachments().is_empty());
    }
}
