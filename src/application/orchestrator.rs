use crate::domain::av::{Encoder, ManifestBuilder, MediaProbe};
use crate::domain::error::{EncodeError, JobError, PersistError};
use crate::domain::jobs::TranscodeRequest;
use crate::domain::ladder::{RenditionLadder, RenditionPlan};
use crate::domain::video::{OutputLayout, Rendition};
use crate::ports::persistence::PersistenceGateway;
use futures::future::join_all;
use std::fmt;
use std::path::PathBuf;

/// Stages a job moves through. `Failed` is only reachable from `Probing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Probing,
    Planning,
    Encoding,
    Joining,
    Manifesting,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Probing => "probing",
            JobState::Planning => "planning",
            JobState::Encoding => "encoding",
            JobState::Joining => "joining",
            JobState::Manifesting => "manifesting",
            JobState::Persisting => "persisting",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How a job that got past probing ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Manifest built and the video marked ready.
    Ready,
    /// Every encode unit failed; nothing to package.
    NoRenditions,
    /// Renditions exist in the store but the video stays not-ready.
    ManifestFailed,
    /// Manifest exists on disk but the video row could not be updated.
    PersistFailed,
}

#[derive(Debug, Clone)]
pub struct JobReport {
    pub video_id: String,
    pub plan: RenditionPlan,
    pub renditions: Vec<Rendition>,
    pub manifest: Option<PathBuf>,
    pub outcome: JobOutcome,
}

#[derive(Debug)]
enum UnitError {
    Encode(EncodeError),
    Persist(PersistError),
}

impl fmt::Display for UnitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitError::Encode(e) => write!(f, "{}", e),
            UnitError::Persist(e) => write!(f, "could not record rendition: {}", e),
        }
    }
}

/// Runs one transcode job: probe, plan, fan-out encode, join, package, persist.
pub struct JobOrchestrator<P> {
    probe: MediaProbe,
    encoder: Encoder,
    manifest: ManifestBuilder,
    store: P,
}

impl<P> JobOrchestrator<P>
where
    P: PersistenceGateway,
{
    pub fn new(probe: MediaProbe, encoder: Encoder, manifest: ManifestBuilder, store: P) -> Self {
        Self {
            probe,
            encoder,
            manifest,
            store,
        }
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    pub async fn run(&self, request: &TranscodeRequest) -> Result<JobReport, JobError> {
        let video_id = request.video_id.as_str();
        let source = request.source();

        enter(video_id, JobState::Probing);
        let geometry = match self.probe.probe(source).await {
            Ok(geometry) => geometry,
            Err(source) => {
                enter(video_id, JobState::Failed);
                tracing::error!(video_id, error = %source, "probe failed, job aborted");
                return Err(JobError::Probe {
                    video_id: video_id.to_string(),
                    source,
                });
            }
        };

        enter(video_id, JobState::Planning);
        let plan = RenditionLadder::plan(geometry.height);
        tracing::info!(
            video_id,
            width = geometry.width,
            height = geometry.height,
            plan = ?plan.heights(),
            "rendition plan ready"
        );

        enter(video_id, JobState::Encoding);
        let units = plan.iter().map(|height| self.encode_unit(request, height));
        let results = join_all(units).await;

        enter(video_id, JobState::Joining);
        let mut renditions = Vec::with_capacity(plan.len());
        let mut produced = Vec::with_capacity(plan.len());
        for (height, result) in plan.iter().zip(results) {
            match result {
                Ok(rendition) => {
                    produced.push(height);
                    renditions.push(rendition);
                }
                Err(e) => tracing::warn!(video_id, height, error = %e, "rendition dropped"),
            }
        }
        tracing::info!(
            video_id,
            produced = renditions.len(),
            planned = plan.len(),
            "encode units joined"
        );

        let mut report = JobReport {
            video_id: video_id.to_string(),
            plan,
            renditions,
            manifest: None,
            outcome: JobOutcome::NoRenditions,
        };

        if produced.is_empty() {
            tracing::error!(video_id, "no rendition was produced, video left not-ready");
            enter(video_id, JobState::Done);
            return Ok(report);
        }

        enter(video_id, JobState::Manifesting);
        let layout = match OutputLayout::for_source(source) {
            Some(layout) => layout,
            None => {
                tracing::error!(video_id, path = %source.display(), "source has no file name");
                report.outcome = JobOutcome::ManifestFailed;
                enter(video_id, JobState::Done);
                return Ok(report);
            }
        };
        let manifest = match self.manifest.build(&layout, &produced).await {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::error!(
                    video_id,
                    error = %e,
                    orphaned = report.renditions.len(),
                    "manifest failed, video left not-ready"
                );
                report.outcome = JobOutcome::ManifestFailed;
                enter(video_id, JobState::Done);
                return Ok(report);
            }
        };

        enter(video_id, JobState::Persisting);
        report.outcome = match self.mark_ready(video_id, &manifest, &report.renditions).await {
            Ok(()) => JobOutcome::Ready,
            Err(e) => {
                tracing::error!(video_id, error = %e, "could not mark video ready");
                JobOutcome::PersistFailed
            }
        };
        report.manifest = Some(manifest);

        enter(video_id, JobState::Done);
        Ok(report)
    }

    async fn encode_unit(
        &self,
        request: &TranscodeRequest,
        height: u32,
    ) -> Result<Rendition, UnitError> {
        let rendition = self
            .encoder
            .encode(request.source(), &request.video_id, height)
            .await
            .map_err(UnitError::Encode)?;
        self.store
            .create_rendition(rendition)
            .await
            .map_err(UnitError::Persist)
    }

    async fn mark_ready(
        &self,
        video_id: &str,
        manifest: &std::path::Path,
        renditions: &[Rendition],
    ) -> Result<(), PersistError> {
        let mut video = self.store.get_video(video_id).await?;
        video.is_ready_to_serve = true;
        video.stream_file_path = Some(manifest.to_string_lossy().into_owned());
        video.renderings = renditions.to_vec();
        self.store.update_video(video).await?;
        Ok(())
    }
}

fn enter(video_id: &str, state: JobState) {
    tracing::info!(video_id, %state, "job state");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ProbeError;
    use crate::testing::{MemoryGateway, ScriptedTools};
    use crate::domain::video::Video;
    use std::sync::Arc;
    use std::time::Duration;

    fn orchestrator(tools: &Arc<ScriptedTools>, store: MemoryGateway) -> JobOrchestrator<MemoryGateway> {
        let (probe, encoder, manifest) = tools.components();
        JobOrchestrator::new(probe, encoder, manifest, store)
    }

    fn request() -> TranscodeRequest {
        TranscodeRequest {
            path: "/media/42/in.mp4".to_string(),
            video_id: "42".to_string(),
        }
    }

    fn store_with_video() -> MemoryGateway {
        let store = MemoryGateway::new();
        store.insert_video(Video::new("42", "in"));
        store
    }

    #[tokio::test]
    async fn full_ladder_marks_video_ready() {
        let tools = Arc::new(ScriptedTools::new(1920, 1080));
        let job = orchestrator(&tools, store_with_video());

        let report = job.run(&request()).await.unwrap();

        assert_eq!(report.outcome, JobOutcome::Ready);
        assert_eq!(report.plan.heights(), &[720, 540, 360]);
        assert_eq!(tools.encoded_heights(), vec![360, 540, 720]);
        assert_eq!(report.manifest, Some(PathBuf::from("/media/42/in.mpd")));

        let video = job.store().video("42").unwrap();
        assert!(video.is_ready_to_serve);
        assert_eq!(video.stream_file_path.as_deref(), Some("/media/42/in.mpd"));
        assert_eq!(video.renderings.len(), 3);
    }

    #[tokio::test]
    async fn encode_units_run_concurrently() {
        let tools = Arc::new(ScriptedTools::new(1920, 1080));
        tools.rendezvous(3);
        let job = orchestrator(&tools, store_with_video());

        let report = tokio::time::timeout(Duration::from_secs(5), job.run(&request()))
            .await
            .expect("every unit must be in flight before any finishes")
            .unwrap();

        assert_eq!(report.outcome, JobOutcome::Ready);
        assert_eq!(tools.encoded_heights(), vec![360, 540, 720]);
    }

    #[tokio::test]
    async fn one_failed_unit_still_joins() {
        let tools = Arc::new(ScriptedTools::new(1280, 720));
        tools.fail_encode(540);
        let job = orchestrator(&tools, store_with_video());

        let report = job.run(&request()).await.unwrap();

        assert_eq!(tools.encode_attempts(), 3);
        assert_eq!(report.outcome, JobOutcome::Ready);
        assert_eq!(report.renditions.len(), 2);
        let video = job.store().video("42").unwrap();
        assert_eq!(video.renderings.len(), 2);
        assert!(video.renderings.iter().all(|r| r.height != 540));
        assert_eq!(tools.manifest_inputs(), vec![vec![720, 360]]);
    }

    #[tokio::test]
    async fn probe_failure_dispatches_nothing() {
        let tools = Arc::new(ScriptedTools::new(1280, 720));
        tools.fail_source_probe();
        let job = orchestrator(&tools, store_with_video());

        let err = job.run(&request()).await.unwrap_err();

        assert!(matches!(
            err,
            JobError::Probe { source: ProbeError::ToolFailure { .. }, .. }
        ));
        assert_eq!(tools.encode_attempts(), 0);
        assert!(job.store().renditions("42").is_empty());
        assert!(!job.store().video("42").unwrap().is_ready_to_serve);
    }

    #[tokio::test]
    async fn manifest_failure_leaves_orphans() {
        let tools = Arc::new(ScriptedTools::new(1280, 720));
        tools.fail_manifest();
        let job = orchestrator(&tools, store_with_video());

        let report = job.run(&request()).await.unwrap();

        assert_eq!(report.outcome, JobOutcome::ManifestFailed);
        assert_eq!(job.store().renditions("42").len(), 3);
        let video = job.store().video("42").unwrap();
        assert!(!video.is_ready_to_serve);
        assert!(video.stream_file_path.is_none());
    }

    #[tokio::test]
    async fn all_units_failing_skips_the_manifest() {
        let tools = Arc::new(ScriptedTools::new(640, 360));
        tools.fail_encode(360);
        let job = orchestrator(&tools, store_with_video());

        let report = job.run(&request()).await.unwrap();

        assert_eq!(report.outcome, JobOutcome::NoRenditions);
        assert!(tools.manifest_inputs().is_empty());
        assert!(!job.store().video("42").unwrap().is_ready_to_serve);
    }

    #[tokio::test]
    async fn failed_rendition_writes_drop_their_units() {
        let tools = Arc::new(ScriptedTools::new(1280, 720));
        let store = store_with_video();
        store.fail_writes();
        let job = orchestrator(&tools, store);

        let report = job.run(&request()).await.unwrap();

        assert_eq!(tools.encoded_heights(), vec![360, 540, 720]);
        assert_eq!(report.outcome, JobOutcome::NoRenditions);
        assert!(report.renditions.is_empty());
        assert!(tools.manifest_inputs().is_empty());
    }

    #[tokio::test]
    async fn missing_video_row_is_a_persist_failure() {
        let tools = Arc::new(ScriptedTools::new(640, 480));
        let job = orchestrator(&tools, MemoryGateway::new());

        let report = job.run(&request()).await.unwrap();

        assert_eq!(report.outcome, JobOutcome::PersistFailed);
        assert_eq!(report.renditions.len(), 1);
        assert!(report.manifest.is_some());
    }

    #[tokio::test]
    async fn low_resolution_source_is_upscaled() {
        let tools = Arc::new(ScriptedTools::new(320, 240));
        let job = orchestrator(&tools, store_with_video());

        let report = job.run(&request()).await.unwrap();

        assert_eq!(report.plan.heights(), &[360]);
        assert_eq!(report.renditions[0].title, "in_360");
        assert_eq!(report.outcome, JobOutcome::Ready);
    }
}
