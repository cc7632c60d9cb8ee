//! Top-level orchestration: device enumeration, program build, and the
//! per-device round-driver threads.
//!
//! Grounded on `original_source/profanity.cpp`'s `main()` (device
//! enumeration, cache-or-compile, `-D PROFANITY_INVERSE_SIZE=...` build
//! options) and `worker::pool::WorkerPool` (thread spawning, result
//! channel, cooperative stop flag, `Drop` that joins).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use opencl3::context::Context;
use opencl3::device::{get_all_devices, Device, CL_DEVICE_TYPE_GPU};
use opencl3::program::Program;

use crate::aggregator::{Hit, ResultAggregator};
use crate::cache;
use crate::config::Config;
use crate::crypto::SeedKey;
use crate::device::{DeviceContext, DevicePciId};
use crate::error::{CoreError, GpuError};
use crate::mode::Mode;
use crate::round::RoundDriver;

/// GPU kernel sources, already read from disk by the CLI entry point (file
/// I/O is a collaborator concern, not the dispatcher's).
pub struct KernelSources {
    pub keccak: String,
    pub profanity: String,
}

/// Owns every attached device's round-driver thread and the shared hit
/// stream.
///
/// Keeps `_context`/`_program` alive for as long as any round-driver
/// thread might still be using objects derived from them: OpenCL does not
/// retain a context/program on a dependent object's behalf, so the Rust
/// wrappers have to outlive every `CommandQueue`/`Kernel` built from them.
pub struct Dispatcher {
    _context: Arc<Context>,
    _program: Arc<Program>,
    stop_flag: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
    hits: Receiver<Hit>,
    device_count: usize,
}

impl Dispatcher {
    /// Enumerates devices, applies `--skip`, builds (or loads from cache)
    /// the program, and spawns one round-driver thread per remaining
    /// device.
    pub fn new(
        seed: SeedKey,
        mode: Mode,
        sources: &KernelSources,
        config: &Config,
        cache_dir: &Path,
    ) -> Result<Self, CoreError> {
        let found = get_all_devices(CL_DEVICE_TYPE_GPU)
            .map_err(|e| GpuError::Enumeration(e.to_string()))?;

        let devices: Vec<Device> = found
            .into_iter()
            .enumerate()
            .filter(|(index, _)| !config.skip.contains(index))
            .map(|(_, id)| Device::new(id))
            .collect();

        if devices.is_empty() {
            return Err(crate::error::ConfigError::NoDevices.into());
        }

        let unique_ids: Vec<String> = devices.iter().map(|d| d.unique_id()).collect();

        // mirrors `original_source/profanity.cpp:262-263`: print `[cached]`
        // beside every device whose compiled-kernel binary is already on
        // disk for this `inverse_size`, before actually loading or building
        // the shared program.
        for (index, device) in devices.iter().enumerate() {
            let name = device.name().unwrap_or_else(|_| "unknown".to_string());
            let cached = !config.no_cache
                && cache::load(cache_dir, config.inverse_size, &unique_ids[index]).is_ok();
            if cached {
                println!("  GPU{}: {} [cached]", index, name);
            } else {
                println!("  GPU{}: {}", index, name);
            }
        }

        let device_ids: Vec<_> = devices.iter().map(|d| d.id()).collect();
        let context = Arc::new(
            Context::from_devices(&device_ids, &[], None, std::ptr::null_mut())
                .map_err(|e| GpuError::ContextCreation(e.to_string()))?,
        );

        let program = Arc::new(Self::load_or_build_program(
            &context,
            &device_ids,
            &unique_ids,
            sources,
            config,
            cache_dir,
        )?);

        let seed_point = seed.affine_coordinates();
        let (aggregator, hits) = ResultAggregator::new(seed);
        let aggregator = Arc::new(aggregator);
        let stop_flag = Arc::new(AtomicBool::new(false));
        let global_work_size = config.global_work_size();

        let mut handles = Vec::with_capacity(devices.len());
        for index in 0..devices.len() {
            let device_context = DeviceContext::new(
                &context,
                &program,
                &mode,
                seed_point,
                config.inverse_size,
                global_work_size,
                config.worksize_local,
            )?;
            let label = format!("GPU{}", index);
            let aggregator = aggregator.clone();
            let stop_flag = stop_flag.clone();
            // keep the context/program alive for the thread's lifetime
            let _context = context.clone();
            let _program = program.clone();

            let handle = thread::Builder::new()
                .name(format!("round-driver-{}", index))
                .spawn(move || {
                    let _context = _context;
                    let _program = _program;
                    let mut driver = RoundDriver::new(label, device_context, global_work_size);
                    driver.run(&aggregator, &stop_flag);
                })
                .expect("failed to spawn round-driver thread");
            handles.push(handle);
        }

        let device_count = handles.len();
        Ok(Self {
            _context: context,
            _program: program,
            stop_flag,
            handles,
            hits,
            device_count,
        })
    }

    fn load_or_build_program(
        context: &Context,
        device_ids: &[opencl3::types::cl_device_id],
        unique_ids: &[String],
        sources: &KernelSources,
        config: &Config,
        cache_dir: &Path,
    ) -> Result<Program, CoreError> {
        let cached: Option<Vec<Vec<u8>>> = if config.no_cache {
            None
        } else {
            unique_ids
                .iter()
                .map(|id| cache::load(cache_dir, config.inverse_size, id).ok())
                .collect::<Option<Vec<_>>>()
        };

        let build_options = format!(
            "-D PROFANITY_INVERSE_SIZE={} -D PROFANITY_MAX_SCORE=255",
            config.inverse_size
        );

        let (program, used_cache) = match cached {
            Some(binaries) => {
                println!("  loading cached kernels...");
                let binary_slices: Vec<&[u8]> = binaries.iter().map(Vec::as_slice).collect();
                let program = Program::create_from_binary(context, device_ids, &binary_slices)
                    .map_err(|e| GpuError::ProgramCreation(e.to_string()))?;
                program
                    .build(device_ids, &build_options)
                    .map_err(|e| GpuError::BuildFailed(e.to_string()))?;
                (program, true)
            }
            None => {
                println!("  compiling kernels from source...");
                let combined_source = format!("{}\n{}", sources.keccak, sources.profanity);
                let program =
                    Program::create_and_build_from_source(context, &combined_source, &build_options)
                        .map_err(|e| GpuError::BuildFailed(e.to_string()))?;
                (program, false)
            }
        };

        if !used_cache && !config.no_cache {
            if let Ok(binaries) = program.get_binaries() {
                for (unique_id, binary) in unique_ids.iter().zip(binaries.iter()) {
                    if let Err(e) = cache::store(cache_dir, config.inverse_size, unique_id, binary) {
                        eprintln!("warning: failed to write kernel cache for {}: {}", unique_id, e);
                    }
                }
            }
        }

        Ok(program)
    }

    /// Blocks until the next hit, or until the channel closes (every
    /// round-driver thread has stopped).
    pub fn next_hit(&self) -> Option<Hit> {
        self.hits.recv().ok()
    }

    /// Number of devices this dispatcher attached.
    pub fn device_count(&self) -> usize {
        self.device_count
    }

    /// A clone of the cooperative stop flag, for wiring into
    /// `ctrlc::set_handler`.
    pub fn stop_flag_clone(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    /// Signals every round-driver thread to stop after its current round.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    /// Waits for every round-driver thread to exit.
    pub fn join(mut self) {
        self.stop();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Default directory kernel binary caches are read from/written to: the
/// working directory, matching `original_source/profanity.cpp`'s bare
/// relative filenames.
pub fn default_cache_dir() -> PathBuf {
    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cache_dir_is_cwd() {
        assert_eq!(default_cache_dir(), PathBuf::from("."));
    }
}
