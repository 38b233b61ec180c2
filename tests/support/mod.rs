#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use pdfoid::{
    application::render::{
        MetadataTool, PrintConfiguration, Readiness, RenderBackend, RenderError, RenderOptions,
        RenderingSurface, SurfaceError, SurfaceLauncher,
    },
    domain::request::WaitFor,
};
use tokio::sync::Notify;
use url::Url;

pub const SAMPLE_PDF: &[u8] = b"%PDF-1.4\n1 0 obj << /Type /Catalog >> endobj\ntrailer << /Root 1 0 R >>\n%%EOF\n";

/// How a fake surface answers a readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerBehaviour {
    /// The marker is present immediately.
    Present,
    /// The marker never appears; the surface reports a timeout once the
    /// requested duration elapses.
    Absent,
    /// The surface never answers at all.
    Hang,
}

#[derive(Debug)]
pub struct FakeSurfaceState {
    pub marker: Mutex<MarkerBehaviour>,
    pub payload: Mutex<Option<String>>,
    pub fail_launch: Mutex<bool>,
    pub print_gate: Mutex<Option<Arc<Notify>>>,
    pub launches: AtomicUsize,
    pub shutdowns: AtomicUsize,
    pub loaded_html: Mutex<Vec<String>>,
    pub workspaces: Mutex<Vec<PathBuf>>,
    pub print_configs: Mutex<Vec<PrintConfiguration>>,
}

impl Default for FakeSurfaceState {
    fn default() -> Self {
        Self {
            marker: Mutex::new(MarkerBehaviour::Present),
            payload: Mutex::new(Some(STANDARD.encode(SAMPLE_PDF))),
            fail_launch: Mutex::new(false),
            print_gate: Mutex::new(None),
            launches: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
            loaded_html: Mutex::new(Vec::new()),
            workspaces: Mutex::new(Vec::new()),
            print_configs: Mutex::new(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeLauncher {
    pub state: Arc<FakeSurfaceState>,
}

impl FakeLauncher {
    pub fn with_marker(self, marker: MarkerBehaviour) -> Self {
        *self.state.marker.lock().expect("lock") = marker;
        self
    }

    pub fn with_payload(self, payload: Option<String>) -> Self {
        *self.state.payload.lock().expect("lock") = payload;
        self
    }

    pub fn failing_launch(self) -> Self {
        *self.state.fail_launch.lock().expect("lock") = true;
        self
    }

    pub fn with_print_gate(self, gate: Arc<Notify>) -> Self {
        *self.state.print_gate.lock().expect("lock") = Some(gate);
        self
    }

    pub fn launches(&self) -> usize {
        self.state.launches.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.state.shutdowns.load(Ordering::SeqCst)
    }

    pub fn workspaces(&self) -> Vec<PathBuf> {
        self.state.workspaces.lock().expect("lock").clone()
    }

    pub fn loaded_html(&self) -> Vec<String> {
        self.state.loaded_html.lock().expect("lock").clone()
    }

    pub fn print_configs(&self) -> Vec<PrintConfiguration> {
        self.state.print_configs.lock().expect("lock").clone()
    }
}

#[async_trait]
impl SurfaceLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn RenderingSurface>, SurfaceError> {
        self.state.launches.fetch_add(1, Ordering::SeqCst);
        if *self.state.fail_launch.lock().expect("lock") {
            return Err(SurfaceError::Launch("no browser available".to_string()));
        }
        Ok(Box::new(FakeSurface {
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }
}

pub struct FakeSurface {
    state: Arc<FakeSurfaceState>,
    closed: bool,
}

#[async_trait]
impl RenderingSurface for FakeSurface {
    async fn load(&mut self, url: &Url) -> Result<(), SurfaceError> {
        let path = url
            .to_file_path()
            .map_err(|()| SurfaceError::Transport(format!("not a file url: {url}")))?;
        let html = fs::read_to_string(&path).map_err(|err| SurfaceError::Transport(err.to_string()))?;
        self.state.loaded_html.lock().expect("lock").push(html);
        if let Some(dir) = path.parent() {
            self.state
                .workspaces
                .lock()
                .expect("lock")
                .push(dir.to_path_buf());
        }
        Ok(())
    }

    async fn await_ready(&mut self, wait_for: &WaitFor) -> Result<Readiness, SurfaceError> {
        let marker = *self.state.marker.lock().expect("lock");
        match marker {
            MarkerBehaviour::Present => Ok(Readiness::Ready),
            MarkerBehaviour::Absent => {
                tokio::time::sleep(wait_for.timeout()).await;
                Ok(Readiness::TimedOut)
            }
            MarkerBehaviour::Hang => {
                std::future::pending::<()>().await;
                Ok(Readiness::Ready)
            }
        }
    }

    async fn print_to_document(
        &mut self,
        config: &PrintConfiguration,
    ) -> Result<Option<String>, SurfaceError> {
        self.state
            .print_configs
            .lock()
            .expect("lock")
            .push(config.clone());
        let gate = self.state.print_gate.lock().expect("lock").clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(self.state.payload.lock().expect("lock").clone())
    }

    async fn diagnostic_log(&mut self) -> Vec<String> {
        vec![
            "[1] INFO chromedriver started".to_string(),
            "[2] INFO console: waiting for math".to_string(),
        ]
    }

    async fn shutdown(&mut self) {
        if !self.closed {
            self.closed = true;
            self.state.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeMetadataTool {
    pub fail_with: Mutex<Option<String>>,
    pub titles: Mutex<Vec<String>>,
    pub observed: Mutex<Vec<Vec<u8>>>,
}

impl FakeMetadataTool {
    pub fn failing(output: &str) -> Self {
        Self {
            fail_with: Mutex::new(Some(output.to_string())),
            ..Self::default()
        }
    }

    pub fn titles(&self) -> Vec<String> {
        self.titles.lock().expect("lock").clone()
    }

    pub fn observed(&self) -> Vec<Vec<u8>> {
        self.observed.lock().expect("lock").clone()
    }
}

#[async_trait]
impl MetadataTool for FakeMetadataTool {
    async fn set_title(&self, path: &Path, title: &str) -> Result<(), RenderError> {
        let bytes = fs::read(path).map_err(|err| RenderError::metadata(err.to_string()))?;
        self.observed.lock().expect("lock").push(bytes);
        self.titles.lock().expect("lock").push(title.to_string());
        match self.fail_with.lock().expect("lock").clone() {
            Some(output) => Err(RenderError::metadata(output)),
            None => Ok(()),
        }
    }
}

pub struct Harness {
    pub launcher: FakeLauncher,
    pub metadata: Arc<FakeMetadataTool>,
    pub backend: Arc<RenderBackend>,
    pub root: tempfile::TempDir,
}

impl Harness {
    pub fn new(launcher: FakeLauncher) -> Self {
        Self::with(launcher, FakeMetadataTool::default(), 4, Duration::from_secs(5))
    }

    pub fn with(
        launcher: FakeLauncher,
        metadata: FakeMetadataTool,
        max_concurrent_renders: usize,
        queue_timeout: Duration,
    ) -> Self {
        let root = tempfile::tempdir().expect("workspace root");
        let metadata = Arc::new(metadata);
        let backend = RenderBackend::new(
            Arc::new(launcher.clone()),
            metadata.clone(),
            RenderOptions {
                workspace_root: Some(root.path().to_path_buf()),
                max_concurrent_renders,
                queue_timeout,
            },
        );
        Self {
            launcher,
            metadata,
            backend: Arc::new(backend),
            root,
        }
    }

    /// Entries left behind under the workspace root.
    pub fn leftover_workspaces(&self) -> usize {
        fs::read_dir(self.root.path()).expect("read root").count()
    }
}
