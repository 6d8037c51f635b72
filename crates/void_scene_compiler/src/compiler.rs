//! Scene asset compiler
//!
//! ```text
//! scene.json ──► SceneDocument ──► SceneWriter ──► container::compress ──► <stem>.scene
//!      │                                                                       │
//!      └──────────────── CacheManager (evaluate before, store after) ──────────┘
//! ```

use std::path::{Path, PathBuf};

use void_scene_format::{container, v1};

use crate::cache::{BuildRequest, CacheEntry, CacheManager, Fingerprint, GateState};
use crate::catalog::AssetContext;
use crate::config::CompilerConfig;
use crate::document::SceneDocument;
use crate::error::CompileError;
use crate::output;
use crate::writer::SceneWriter;

/// Extension of compiled scene artifacts
pub const ARTIFACT_EXTENSION: &str = "scene";

/// Result of compiling one asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    /// Cache says nothing changed, no file was written
    UpToDate { output: PathBuf },
    Compiled { output: PathBuf, bytes_written: usize },
}

impl CompileOutcome {
    pub fn output(&self) -> &Path {
        match self {
            Self::UpToDate { output } | Self::Compiled { output, .. } => output,
        }
    }

    pub fn was_compiled(&self) -> bool {
        matches!(self, Self::Compiled { .. })
    }
}

/// Compiles scene documents into scene artifacts
pub struct SceneAssetCompiler {
    config: CompilerConfig,
    context: Box<dyn AssetContext>,
}

impl SceneAssetCompiler {
    /// Create a compiler resolving references through `context`
    pub fn new(config: CompilerConfig, context: impl AssetContext + 'static) -> Self {
        Self {
            config,
            context: Box::new(context),
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Artifact path of a source file
    pub fn output_path(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "scene".to_string());
        self.config
            .output_directory
            .join(format!("{}.{}", stem, ARTIFACT_EXTENSION))
    }

    /// Build gate request of a source file
    pub fn build_request(&self, input: &Path) -> BuildRequest {
        let mut inputs = vec![input.to_path_buf()];
        inputs.extend(self.context.dependencies());
        BuildRequest {
            rhi_target: self.config.rhi_target.clone(),
            output: self.output_path(input),
            inputs,
            format_version: v1::FORMAT_VERSION,
        }
    }

    /// Whether compiling `input` would produce a new artifact
    pub fn check_if_changed(&self, input: &Path, cache: &CacheManager) -> Result<bool, CompileError> {
        Ok(cache.evaluate(&self.build_request(input))?.state.needs_recompile())
    }

    /// Compile one source file, skipping it when the cache is up to date
    ///
    /// On failure neither the artifact nor the cache record is touched.
    pub fn compile(&self, input: &Path, cache: &CacheManager) -> Result<CompileOutcome, CompileError> {
        let request = self.build_request(input);
        let key = request.key();
        let lock = cache.artifact_lock(&key);
        let _guard = lock.lock();

        let decision = cache.evaluate(&request)?;
        let output = request.output.clone();
        match &decision.state {
            GateState::UpToDate if !self.config.force => {
                log::debug!("{} is up to date", output.display());
                return Ok(CompileOutcome::UpToDate { output });
            }
            GateState::UpToDate => log::debug!("Forcing rebuild of {}", output.display()),
            GateState::NeedsRecompile(reason) => log::debug!("Compiling {:?}: {}", input, reason),
        }

        let source = std::fs::read(input).map_err(|source| CompileError::InputRead {
            path: input.to_path_buf(),
            source,
        })?;
        let json = std::str::from_utf8(&source)
            .map_err(|e| CompileError::Schema(format!("source is not valid UTF-8: {}", e)))?;
        let artifact = self.compile_artifact(json)?;

        output::write_atomic(&output, &artifact).map_err(|source| CompileError::OutputWrite {
            path: output.clone(),
            source,
        })?;

        // Record what was actually compiled, not what was fingerprinted earlier
        let compiled = Fingerprint::of_bytes(&source);
        let virtual_source_path = input.to_string_lossy().replace('\\', "/");
        let mut entries = decision.entries;
        match entries.iter_mut().find(|e| e.virtual_source_path == virtual_source_path) {
            Some(entry) => entry.fingerprint = compiled,
            None => entries.insert(
                0,
                CacheEntry {
                    rhi_target: request.rhi_target.clone(),
                    virtual_source_path,
                    fingerprint: compiled,
                    format_version: request.format_version,
                },
            ),
        }
        cache.store(key, entries)?;

        log::info!("Compiled {:?} -> {} ({} bytes)", input, output.display(), artifact.len());
        Ok(CompileOutcome::Compiled {
            output,
            bytes_written: artifact.len(),
        })
    }

    /// Compile document text into a decompressed scene buffer
    pub fn compile_source(&self, json: &str) -> Result<Vec<u8>, CompileError> {
        let document = SceneDocument::parse(json)?;
        SceneWriter::new(self.context.as_ref()).write(&document)
    }

    /// Compile document text into a complete compressed artifact
    pub fn compile_artifact(&self, json: &str) -> Result<Vec<u8>, CompileError> {
        let buffer = self.compile_source(json)?;
        Ok(container::compress(v1::FORMAT_TYPE, v1::FORMAT_VERSION, &buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AssetCatalog;

    #[test]
    fn test_output_path() {
        let config = CompilerConfig {
            output_directory: PathBuf::from("out"),
            ..CompilerConfig::default()
        };
        let compiler = SceneAssetCompiler::new(config, AssetCatalog::new());
        assert_eq!(
            compiler.output_path(Path::new("assets/levels/forest.json")),
            PathBuf::from("out/forest.scene")
        );
    }

    #[test]
    fn test_artifact_decodes() {
        let compiler = SceneAssetCompiler::new(CompilerConfig::default(), AssetCatalog::new());
        let artifact = compiler
            .compile_artifact(r#"{ "Nodes": [ { "Items": { "CameraSceneItem": {} } } ] }"#)
            .unwrap();
        let scene = void_scene_format::load_scene_bytes(&artifact).unwrap();
        assert_eq!(scene.item_count(), 1);
    }
}
