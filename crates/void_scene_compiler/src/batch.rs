//! Batch compilation
//!
//! Compiles several assets on scoped worker threads fed from a shared queue.
//! Each worker owns its buffers; the cache serializes writes per artifact.

use std::path::PathBuf;
use std::thread;

use crossbeam_channel::unbounded;

use crate::cache::CacheManager;
use crate::compiler::{CompileOutcome, SceneAssetCompiler};
use crate::error::CompileError;

/// Compile `inputs` with up to `jobs` workers, one result per input in order
pub fn compile_batch(
    compiler: &SceneAssetCompiler,
    inputs: &[PathBuf],
    cache: &CacheManager,
    jobs: usize,
) -> Vec<Result<CompileOutcome, CompileError>> {
    let workers = jobs.clamp(1, inputs.len().max(1));

    let (sender, receiver) = unbounded();
    for job in inputs.iter().enumerate() {
        // Receiver is alive until the end of this function
        let _ = sender.send(job);
    }
    drop(sender);

    let mut results: Vec<(usize, Result<CompileOutcome, CompileError>)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let receiver = receiver.clone();
                scope.spawn(move || {
                    let mut done = Vec::new();
                    for (index, input) in receiver.iter() {
                        let result = compiler.compile(input, cache);
                        if let Err(err) = &result {
                            log::error!("Failed to compile {:?}: {}", input, err);
                        }
                        done.push((index, result));
                    }
                    done
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| match handle.join() {
                Ok(done) => done,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    });

    results.sort_by_key(|(index, _)| *index);
    let compiled = results.iter().filter(|(_, r)| matches!(r, Ok(o) if o.was_compiled())).count();
    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    log::info!(
        "Batch finished: {} compiled, {} up to date, {} failed ({} workers)",
        compiled,
        inputs.len() - compiled - failed,
        failed,
        workers
    );

    results.into_iter().map(|(_, result)| result).collect()
}
