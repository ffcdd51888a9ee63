use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use recode_core::naming::ArtifactName;
use recode_core::pipeline::{
    decompile_and_annotate, run_blob_job, BlobJobSpec, PipelineError,
};
use recode_core::services::blob::{BlobError, BlobStore};
use recode_core::services::decompiler::{
    DecompileError, DecompileOutput, DecompileRequest, Decompiler,
};
use recode_core::services::generation::{GenerationError, TextGenerator};
use recode_core::workspace::WorkspaceLayout;
use tempfile::tempdir;

#[derive(Default)]
struct MemoryStore {
    blobs: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryStore {
    fn with_blob(container: &str, blob: &str, data: &[u8]) -> Self {
        let store = Self::default();
        store.blobs.lock().unwrap().insert((container.into(), blob.into()), data.to_vec());
        store
    }

    fn get(&self, container: &str, blob: &str) -> Option<Vec<u8>> {
        self.blobs.lock().unwrap().get(&(container.to_string(), blob.to_string())).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn download(&self, container: &str, blob: &str) -> Result<Vec<u8>, BlobError> {
        self.get(container, blob).ok_or_else(|| BlobError::NotFound {
            container: container.into(),
            blob: blob.into(),
        })
    }

    async fn upload(&self, container: &str, blob: &str, data: Vec<u8>) -> Result<(), BlobError> {
        self.blobs.lock().unwrap().insert((container.into(), blob.into()), data);
        Ok(())
    }

    async fn ensure_container(&self, _container: &str) -> Result<(), BlobError> {
        Ok(())
    }
}

/// Writes fixed C text to the requested output path and records what it saw.
struct StubDecompiler {
    code: &'static str,
    calls: AtomicUsize,
    seen_binary: Mutex<Option<Vec<u8>>>,
}

impl StubDecompiler {
    fn new(code: &'static str) -> Arc<Self> {
        Arc::new(Self { code, calls: AtomicUsize::new(0), seen_binary: Mutex::new(None) })
    }
}

impl Decompiler for StubDecompiler {
    fn decompile(&self, request: &DecompileRequest) -> Result<DecompileOutput, DecompileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_binary.lock().unwrap() = std::fs::read(&request.binary_path).ok();
        std::fs::write(&request.output_path, self.code).unwrap();
        Ok(DecompileOutput { output_path: request.output_path.clone(), log: String::new() })
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

struct FailingDecompiler;

impl Decompiler for FailingDecompiler {
    fn decompile(&self, request: &DecompileRequest) -> Result<DecompileOutput, DecompileError> {
        Err(DecompileError::MissingOutput(request.output_path.clone()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Answers with the last line of the prompt.
struct EchoLastLine;

#[async_trait]
impl TextGenerator for EchoLastLine {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        Ok(prompt.lines().last().unwrap_or_default().to_string())
    }

    fn name(&self) -> &'static str {
        "echo"
    }
}

struct Unavailable;

#[async_trait]
impl TextGenerator for Unavailable {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Api { status: 503, body: "overloaded".into() })
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

fn spec(blob: &str) -> BlobJobSpec {
    BlobJobSpec {
        source_container: "binaries".into(),
        blob_name: blob.into(),
        output_container: "decompiled".into(),
    }
}

fn is_empty_dir(path: &std::path::Path) -> bool {
    std::fs::read_dir(path).map(|mut d| d.next().is_none()).unwrap_or(true)
}

#[tokio::test]
async fn blob_job_uploads_output_under_sanitized_name() {
    let temp = tempdir().unwrap();
    let layout = WorkspaceLayout::new(temp.path().join("bin"), temp.path().join("out"));
    let store = MemoryStore::with_blob("binaries", "sample.exe", b"MZ\x90");
    let decompiler = StubDecompiler::new("int main(){}");

    let report = run_blob_job(&store, decompiler.clone(), &layout, &spec("sample.exe"))
        .await
        .expect("job");

    assert_eq!(report.output_blob, "sample.c");
    assert_eq!(report.artifact, ArtifactName::from_file_name("sample.exe"));
    assert_eq!(report.input_bytes, 3);
    assert_eq!(report.output_bytes, "int main(){}".len());
    assert_eq!(store.get("decompiled", "sample.c").unwrap(), b"int main(){}");
    assert_eq!(decompiler.seen_binary.lock().unwrap().as_deref(), Some(&b"MZ\x90"[..]));

    // Job directories are gone once the job is done.
    assert!(is_empty_dir(&layout.binary_dir));
    assert!(is_empty_dir(&layout.output_dir));
}

#[cfg(unix)]
#[tokio::test]
async fn stored_binary_is_world_readable() {
    use std::os::unix::fs::PermissionsExt;

    struct ModeProbe(Mutex<Option<u32>>);
    impl Decompiler for ModeProbe {
        fn decompile(
            &self,
            request: &DecompileRequest,
        ) -> Result<DecompileOutput, DecompileError> {
            let mode = std::fs::metadata(&request.binary_path).unwrap().permissions().mode();
            *self.0.lock().unwrap() = Some(mode & 0o777);
            std::fs::write(&request.output_path, "").unwrap();
            Ok(DecompileOutput { output_path: request.output_path.clone(), log: String::new() })
        }
        fn name(&self) -> &'static str {
            "probe"
        }
    }

    let temp = tempdir().unwrap();
    let layout = WorkspaceLayout::new(temp.path().join("bin"), temp.path().join("out"));
    let store = MemoryStore::with_blob("binaries", "a.exe", b"MZ");
    let probe = Arc::new(ModeProbe(Mutex::new(None)));
    run_blob_job(&store, probe.clone(), &layout, &spec("a.exe")).await.unwrap();
    assert_eq!(*probe.0.lock().unwrap(), Some(0o644));
}

#[tokio::test]
async fn missing_blob_aborts_before_decompiling() {
    let temp = tempdir().unwrap();
    let layout = WorkspaceLayout::new(temp.path().join("bin"), temp.path().join("out"));
    let store = MemoryStore::default();
    let decompiler = StubDecompiler::new("int main(){}");

    let err = run_blob_job(&store, decompiler.clone(), &layout, &spec("nope.exe"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Blob(BlobError::NotFound { .. })));
    assert_eq!(decompiler.calls.load(Ordering::SeqCst), 0);
    assert!(is_empty_dir(&layout.binary_dir));
}

#[tokio::test]
async fn decompile_failure_skips_upload_and_cleans_up() {
    let temp = tempdir().unwrap();
    let layout = WorkspaceLayout::new(temp.path().join("bin"), temp.path().join("out"));
    let store = MemoryStore::with_blob("binaries", "sample.exe", b"MZ");

    let err = run_blob_job(&store, Arc::new(FailingDecompiler), &layout, &spec("sample.exe"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Decompile(DecompileError::MissingOutput(_))));
    assert!(store.get("decompiled", "sample.c").is_none());
    assert!(is_empty_dir(&layout.binary_dir));
    assert!(is_empty_dir(&layout.output_dir));
}

#[tokio::test]
async fn keep_artifacts_leaves_job_files() {
    let temp = tempdir().unwrap();
    let layout = WorkspaceLayout::new(temp.path().join("bin"), temp.path().join("out"))
        .with_keep_artifacts(true);
    let store = MemoryStore::with_blob("binaries", "sample.exe", b"MZ");

    let report = run_blob_job(&store, StubDecompiler::new("x"), &layout, &spec("sample.exe"))
        .await
        .unwrap();
    assert!(layout.binary_dir.join(&report.job_id).join("sample.exe").is_file());
    assert!(layout.output_dir.join(&report.job_id).join("sample.c").is_file());
}

#[tokio::test]
async fn annotate_returns_generated_text() {
    let temp = tempdir().unwrap();
    let layout = WorkspaceLayout::new(temp.path().join("bin"), temp.path().join("out"));
    let job = layout.job(&ArtifactName::from_file_name("sample.exe"));
    job.prepare().unwrap();
    std::fs::write(&job.binary_path, b"MZ").unwrap();

    let text = decompile_and_annotate(StubDecompiler::new("int main(){}"), &EchoLastLine, &job)
        .await
        .unwrap();
    assert_eq!(text, "int main(){}");
}

#[tokio::test]
async fn annotate_propagates_generation_errors() {
    let temp = tempdir().unwrap();
    let layout = WorkspaceLayout::new(temp.path().join("bin"), temp.path().join("out"));
    let job = layout.job(&ArtifactName::from_file_name("sample.exe"));
    job.prepare().unwrap();
    std::fs::write(&job.binary_path, b"MZ").unwrap();

    let err = decompile_and_annotate(StubDecompiler::new("int main(){}"), &Unavailable, &job)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Generation(GenerationError::Api { status: 503, .. })));
}
