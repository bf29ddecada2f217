use crate::domain::av::{Encoder, ManifestBuilder, MediaProbe, ToolRunner};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Output};
use std::sync::{Arc, Mutex};
use tokio::sync::Barrier;

const FFPROBE: &str = "ffprobe";
const FFMPEG: &str = "ffmpeg";
const MP4BOX: &str = "MP4Box";

#[derive(Default)]
struct Script {
    failing_heights: HashSet<u32>,
    fail_source_probe: bool,
    fail_manifest: bool,
    encode_attempts: usize,
    encoded: Vec<u32>,
    outputs: HashMap<String, u32>,
    manifest_inputs: Vec<Vec<u32>>,
}

/// Fake ffprobe/ffmpeg/MP4Box that answer from a script instead of touching files.
///
/// The source reports the configured geometry. Encoded outputs report their bucket
/// height with a 16:9 width rounded down to an even number.
pub struct ScriptedTools {
    width: u32,
    height: u32,
    script: Mutex<Script>,
    rendezvous: Mutex<Option<Arc<Barrier>>>,
}

impl ScriptedTools {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            script: Mutex::new(Script::default()),
            rendezvous: Mutex::new(None),
        }
    }

    /// Probe, encoder and packager all driven by this script.
    pub fn components(self: &Arc<Self>) -> (MediaProbe, Encoder, ManifestBuilder) {
        let runner: Arc<dyn ToolRunner> = self.clone();
        let probe = MediaProbe::new(runner.clone(), FFPROBE);
        let encoder = Encoder::new(runner.clone(), probe.clone(), FFMPEG, "aac");
        let manifest = ManifestBuilder::new(runner, MP4BOX);
        (probe, encoder, manifest)
    }

    pub fn fail_encode(&self, height: u32) {
        self.script.lock().unwrap().failing_heights.insert(height);
    }

    /// Every encode waits until `units` encodes are running at once.
    pub fn rendezvous(&self, units: usize) {
        *self.rendezvous.lock().unwrap() = Some(Arc::new(Barrier::new(units)));
    }

    pub fn fail_source_probe(&self) {
        self.script.lock().unwrap().fail_source_probe = true;
    }

    pub fn fail_manifest(&self) {
        self.script.lock().unwrap().fail_manifest = true;
    }

    pub fn encode_attempts(&self) -> usize {
        self.script.lock().unwrap().encode_attempts
    }

    /// Heights that encoded successfully, ascending.
    pub fn encoded_heights(&self) -> Vec<u32> {
        let mut heights = self.script.lock().unwrap().encoded.clone();
        heights.sort_unstable();
        heights
    }

    /// Heights handed to each packager run, in argument order.
    pub fn manifest_inputs(&self) -> Vec<Vec<u32>> {
        self.script.lock().unwrap().manifest_inputs.clone()
    }

    fn probe(&self, path: &str) -> Output {
        let script = self.script.lock().unwrap();
        let (width, height) = match script.outputs.get(path) {
            Some(height) => ((height * 16 / 9) & !1, *height),
            None if script.fail_source_probe => {
                return exit(false, "", "Invalid data found when processing input")
            }
            None => (self.width, self.height),
        };
        let stdout = serde_json::json!({
            "streams": [
                {"index": 0, "codec_type": "video", "width": width, "height": height},
                {"index": 1, "codec_type": "audio"}
            ]
        });
        exit(true, &stdout.to_string(), "")
    }

    fn encode(&self, args: &[String]) -> Output {
        let height = args
            .iter()
            .find_map(|arg| arg.strip_prefix("scale=-2:"))
            .and_then(|h| h.parse::<u32>().ok());
        let output = args.last().cloned().unwrap_or_default();

        let mut script = self.script.lock().unwrap();
        script.encode_attempts += 1;
        match height {
            Some(height) if !script.failing_heights.contains(&height) => {
                script.encoded.push(height);
                script.outputs.insert(output, height);
                exit(true, "", "")
            }
            _ => exit(false, "", "Conversion failed!"),
        }
    }

    fn package(&self, args: &[String]) -> Output {
        let mut script = self.script.lock().unwrap();
        let heights: Vec<u32> = args
            .iter()
            .filter_map(|arg| arg.strip_suffix("#video"))
            .filter_map(|path| script.outputs.get(path).copied())
            .collect();
        script.manifest_inputs.push(heights);
        if script.fail_manifest {
            exit(false, "", "No such file or directory")
        } else {
            exit(true, "", "")
        }
    }
}

#[async_trait]
impl ToolRunner for ScriptedTools {
    async fn run(&self, program: &str, args: &[String]) -> io::Result<Output> {
        match program {
            FFPROBE => Ok(self.probe(args.last().map(String::as_str).unwrap_or_default())),
            FFMPEG => {
                let barrier = self.rendezvous.lock().unwrap().clone();
                if let Some(barrier) = barrier {
                    barrier.wait().await;
                }
                Ok(self.encode(args))
            }
            MP4BOX => Ok(self.package(args)),
            other => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not scripted", other),
            )),
        }
    }
}

fn exit(success: bool, stdout: &str, stderr: &str) -> Output {
    Output {
        status: ExitStatus::from_raw(if success { 0 } else { 1 << 8 }),
        stdout: stdout.as_bytes().to_vec(),
        stderr: stderr.as_bytes().to_vec(),
    }
}
