//! Per-device OpenCL state: buffers, kernels, and the round pipeline's GPU
//! side. One [`DeviceContext`] per attached GPU, owned by its
//! [`crate::round::RoundDriver`] thread.

use opencl3::command_queue::{CommandQueue, CL_QUEUE_PROFILING_ENABLE};
use opencl3::context::Context;
use opencl3::device::{get_device_info, Device};
use opencl3::info_type::InfoType;
use opencl3::kernel::{ExecuteKernel, Kernel};
use opencl3::memory::{Buffer, CL_MEM_READ_ONLY, CL_MEM_READ_WRITE, CL_MEM_WRITE_ONLY};
use opencl3::program::Program;
use opencl3::types::{cl_uchar, cl_uint, cl_ulong, CL_BLOCKING};

use crate::error::GpuError;
use crate::mode::Mode;

/// Maximum number of hits a single round can report; generous enough that
/// the round never has to drop a genuine improvement on the floor.
pub const MAX_RESULTS_PER_ROUND: u32 = 256;

/// Result buffers are double-buffered by round parity (`round % 2`) rather
/// than reused across every round: with two rounds kept in flight
/// (`round.rs`'s `RoundDriver`), enqueuing round N+1 resets and overwrites a
/// shared result buffer before round N's results have been read back, since
/// the in-order queue processes the reset ahead of the blocking readback.
/// Alternating between two buffer slots means round N+1's enqueue only ever
/// touches the slot round N-1 used (already collected by then), never the
/// slot holding round N's still-unread results.
const RESULT_SLOTS: usize = 2;

/// Per-lane point state kept resident across rounds: X and Y coordinates,
/// 32 bytes each. Owned entirely by the kernel source; the host only needs
/// to know its size to allocate and keep it alive.
const POINT_STATE_BYTES: usize = 64;

/// Per-lane scratch space the batched modular-inversion kernel needs across
/// the inversion pass.
const INVERSE_STATE_BYTES: usize = 32;

/// Per-lane derived address, written by the Keccak kernel and consumed by
/// the score kernel.
const HASH_BYTES: usize = 20;

// Vendor-specific device info queries used by `unique_id()`. opencl3 does not
// wrap these (they're vendor extensions), so the raw `cl_device_info` values
// from the CL/cl_ext.h headers are used directly.
const CL_DEVICE_TOPOLOGY_AMD: u32 = 0x4037;
const CL_DEVICE_PCI_BUS_ID_NV: u32 = 0x4008;
const CL_DEVICE_PCI_SLOT_ID_NV: u32 = 0x4009;

/// One hit read back from the score kernel's result buffer.
///
/// `round` and `offset` are 64-bit per spec.md §3's data model ("Round
/// index: monotonically increasing 64-bit counter", "no wraparound in
/// practice"): at the default `inverse_size=255`/`inverse_multiple=16384`
/// (`work_max` ~4.18M), a 32-bit round counter would wrap in ~1027 rounds,
/// silently truncating the offset a hit's private key is reconstructed
/// from.
#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct GpuResult {
    pub round: cl_ulong,
    pub offset: cl_ulong,
    pub score: cl_uint,
    pub address: [u8; 20],
}

/// Derives a cache- and log-stable identifier for a device.
///
/// Mirrors `original_source/profanity.cpp`'s `getUniqueDeviceIdentifier`:
/// AMD devices report a PCI topology struct, NVIDIA devices report bus/slot
/// IDs separately, and anything else falls back to an opaque per-process
/// handle (redesign note: the original silently fell back to index 0 for
/// unknown vendors, which collides across multi-GPU rigs of mixed/unknown
/// vendor; the opaque handle here is the device pointer value, which is at
/// least unique within one process run).
pub trait DevicePciId {
    fn unique_id(&self) -> String;
}

impl DevicePciId for Device {
    fn unique_id(&self) -> String {
        if let Ok(InfoType::VecUchar(topology)) =
            get_device_info(self.id(), CL_DEVICE_TOPOLOGY_AMD)
        {
            // cl_device_topology_amd: a 1-byte type tag followed by a union;
            // PCIe variant stores bus/device/function at a fixed offset.
            if topology.len() >= 25 {
                let bus = topology[21];
                let device = topology[22];
                let function = topology[23];
                return format!("amd:{:02x}:{:02x}.{:x}", bus, device, function);
            }
        }

        if let (Ok(InfoType::Uint(bus)), Ok(InfoType::Uint(slot))) = (
            get_device_info(self.id(), CL_DEVICE_PCI_BUS_ID_NV),
            get_device_info(self.id(), CL_DEVICE_PCI_SLOT_ID_NV),
        ) {
            return format!("nvidia:{:02x}:{:02x}", bus, slot);
        }

        format!("opaque:{:x}", self.id() as usize)
    }
}

/// Owns the OpenCL objects and device-resident buffers for one attached GPU.
///
/// Each round runs the six-kernel pipeline described by
/// `original_source/profanity.cpp`'s kernel dispatch: `init` seeds every
/// lane's point once, then each round runs `inverse` (batched modular
/// inversion), `point_add` (advances every lane by one step), an optional
/// `transform` (only for contract-address targets), `keccak` (derives the
/// candidate address from the point), and finally the mode's `score`
/// kernel. Point/inverse/hash state lives in device-resident buffers that
/// persist across rounds; only `data1`/`data2`/`best_score` are re-uploaded
/// and only `result`/`result_count` are read back.
pub struct DeviceContext {
    queue: CommandQueue,
    init_kernel: Kernel,
    inverse_kernel: Kernel,
    point_add_kernel: Kernel,
    keccak_kernel: Kernel,
    transform_kernel: Option<Kernel>,
    score_kernel: Kernel,
    score_kernel_name: String,
    best_score_buf: Buffer<cl_uint>,
    data1_buf: Buffer<cl_uchar>,
    data2_buf: Buffer<cl_uchar>,
    seed_point_buf: Buffer<cl_uchar>,
    points_buf: Buffer<cl_uchar>,
    inverse_buf: Buffer<cl_uchar>,
    hashes_buf: Buffer<cl_uchar>,
    /// Indexed by `round % RESULT_SLOTS`; see [`RESULT_SLOTS`].
    result_bufs: [Buffer<cl_uchar>; RESULT_SLOTS],
    result_count_bufs: [Buffer<cl_uint>; RESULT_SLOTS],
    inverse_size: usize,
    lanes: usize,
    local_work_size: usize,
    initialized: bool,
}

impl DeviceContext {
    /// Binds a compiled [`Program`] to one device and allocates its
    /// round buffers. `lanes` is the device's global work size: one point
    /// per work item, kept resident for the life of the context.
    /// `local_work_size` is the `-w/--work` work-group size applied to
    /// every kernel launch in the round pipeline.
    pub fn new(
        context: &Context,
        program: &Program,
        mode: &Mode,
        seed_point: ([u8; 32], [u8; 32]),
        inverse_size: usize,
        lanes: usize,
        local_work_size: usize,
    ) -> Result<Self, GpuError> {
        let queue = CommandQueue::create_default_with_properties(context, CL_QUEUE_PROFILING_ENABLE, 0)
            .map_err(|e| GpuError::ContextCreation(e.to_string()))?;

        let make_kernel = |name: &str| -> Result<Kernel, GpuError> {
            Kernel::create(program, name).map_err(|e| GpuError::KernelLaunch {
                name: name.to_string(),
                reason: e.to_string(),
            })
        };

        let init_kernel = make_kernel("profanity_init")?;
        let inverse_kernel = make_kernel("profanity_inverse")?;
        let point_add_kernel = make_kernel("profanity_iterate")?;
        let keccak_kernel = make_kernel("profanity_transform_keccak")?;
        let score_kernel_name = mode.kernel.kernel_name().to_string();
        let score_kernel = make_kernel(&score_kernel_name)?;

        let transform_kernel = match mode.target.transform_kernel_id() {
            Some(name) => Some(make_kernel(name)?),
            None => None,
        };

        let best_score_buf = unsafe {
            Buffer::<cl_uint>::create(context, CL_MEM_READ_ONLY, 1, std::ptr::null_mut())
                .map_err(|e| GpuError::Buffer(e.to_string()))?
        };
        let data1_buf = unsafe {
            Buffer::<cl_uchar>::create(context, CL_MEM_READ_ONLY, mode.data1.len(), std::ptr::null_mut())
                .map_err(|e| GpuError::Buffer(e.to_string()))?
        };
        let data2_buf = unsafe {
            Buffer::<cl_uchar>::create(context, CL_MEM_READ_ONLY, mode.data2.len(), std::ptr::null_mut())
                .map_err(|e| GpuError::Buffer(e.to_string()))?
        };
        let seed_point_buf = unsafe {
            Buffer::<cl_uchar>::create(context, CL_MEM_READ_ONLY, 64, std::ptr::null_mut())
                .map_err(|e| GpuError::Buffer(e.to_string()))?
        };
        let points_buf = unsafe {
            Buffer::<cl_uchar>::create(
                context,
                CL_MEM_READ_WRITE,
                lanes * POINT_STATE_BYTES,
                std::ptr::null_mut(),
            )
            .map_err(|e| GpuError::Buffer(e.to_string()))?
        };
        let inverse_buf = unsafe {
            Buffer::<cl_uchar>::create(
                context,
                CL_MEM_READ_WRITE,
                lanes * INVERSE_STATE_BYTES,
                std::ptr::null_mut(),
            )
            .map_err(|e| GpuError::Buffer(e.to_string()))?
        };
        let hashes_buf = unsafe {
            Buffer::<cl_uchar>::create(context, CL_MEM_READ_WRITE, lanes * HASH_BYTES, std::ptr::null_mut())
                .map_err(|e| GpuError::Buffer(e.to_string()))?
        };
        let make_result_buf = || -> Result<Buffer<cl_uchar>, GpuError> {
            unsafe {
                Buffer::<cl_uchar>::create(
                    context,
                    CL_MEM_WRITE_ONLY,
                    MAX_RESULTS_PER_ROUND as usize * std::mem::size_of::<GpuResult>(),
                    std::ptr::null_mut(),
                )
                .map_err(|e| GpuError::Buffer(e.to_string()))
            }
        };
        let make_result_count_buf = || -> Result<Buffer<cl_uint>, GpuError> {
            unsafe {
                Buffer::<cl_uint>::create(context, CL_MEM_READ_WRITE, 1, std::ptr::null_mut())
                    .map_err(|e| GpuError::Buffer(e.to_string()))
            }
        };
        let result_bufs = [make_result_buf()?, make_result_buf()?];
        let result_count_bufs = [make_result_count_buf()?, make_result_count_buf()?];

        let mut ctx = Self {
            queue,
            init_kernel,
            inverse_kernel,
            point_add_kernel,
            keccak_kernel,
            transform_kernel,
            score_kernel,
            score_kernel_name,
            best_score_buf,
            data1_buf,
            data2_buf,
            seed_point_buf,
            points_buf,
            inverse_buf,
            hashes_buf,
            result_bufs,
            result_count_bufs,
            inverse_size,
            lanes,
            local_work_size,
            initialized: false,
        };

        ctx.upload_constants(mode, seed_point)?;
        Ok(ctx)
    }

    fn upload_constants(
        &mut self,
        mode: &Mode,
        seed_point: ([u8; 32], [u8; 32]),
    ) -> Result<(), GpuError> {
        let mut point_bytes = [0u8; 64];
        point_bytes[..32].copy_from_slice(&seed_point.0);
        point_bytes[32..].copy_from_slice(&seed_point.1);

        unsafe {
            self.queue
                .enqueue_write_buffer(&mut self.data1_buf, CL_BLOCKING, 0, &mode.data1, &[])
                .map_err(|e| GpuError::Buffer(e.to_string()))?;
            self.queue
                .enqueue_write_buffer(&mut self.data2_buf, CL_BLOCKING, 0, &mode.data2, &[])
                .map_err(|e| GpuError::Buffer(e.to_string()))?;
            self.queue
                .enqueue_write_buffer(&mut self.seed_point_buf, CL_BLOCKING, 0, &point_bytes, &[])
                .map_err(|e| GpuError::Buffer(e.to_string()))?;
        }
        Ok(())
    }

    /// Seeds every lane's starting point once. Run lazily on the first
    /// round instead of from `new`, so constructing a `DeviceContext`
    /// never itself enqueues device work.
    fn ensure_initialized(&mut self) -> Result<(), GpuError> {
        if self.initialized {
            return Ok(());
        }
        unsafe {
            ExecuteKernel::new(&self.init_kernel)
                .set_arg(&self.seed_point_buf)
                .set_arg(&mut self.points_buf)
                .set_local_work_size(self.local_work_size)
                .set_global_work_size(self.lanes)
                .enqueue_nd_range(&self.queue)
                .map_err(|e| GpuError::KernelLaunch {
                    name: "profanity_init".to_string(),
                    reason: e.to_string(),
                })?;
        }
        self.initialized = true;
        Ok(())
    }

    /// Refreshes the device-resident best-score value before a round, so
    /// the score kernel only reports strict improvements.
    pub fn refresh_best_score(&mut self, best_score: u32) -> Result<(), GpuError> {
        let value = [best_score];
        unsafe {
            self.queue
                .enqueue_write_buffer(&mut self.best_score_buf, CL_BLOCKING, 0, &value, &[])
                .map_err(|e| GpuError::Buffer(e.to_string()))?;
        }
        Ok(())
    }

    /// Enqueues one full round: inverse, point_add, optional transform,
    /// keccak, then score, over `global_work_size` work items for round
    /// index `round`.
    ///
    /// Does not block on completion: the device's command queue is
    /// in-order, so [`RoundDriver`](crate::round::RoundDriver) can enqueue
    /// the next round immediately and let [`collect_results`] synchronize
    /// only when it actually needs this round's data back, which is what
    /// keeps two rounds in flight and hides host/device round-trip latency.
    pub fn enqueue_round(&mut self, round: u64, global_work_size: usize) -> Result<(), GpuError> {
        self.ensure_initialized()?;

        let round: cl_ulong = round;
        let slot = (round as usize) % RESULT_SLOTS;
        let zero_count = [0u32];
        unsafe {
            self.queue
                .enqueue_write_buffer(
                    &mut self.result_count_bufs[slot],
                    CL_BLOCKING,
                    0,
                    &zero_count,
                    &[],
                )
                .map_err(|e| GpuError::Buffer(e.to_string()))?;

            ExecuteKernel::new(&self.inverse_kernel)
                .set_arg(&mut self.points_buf)
                .set_arg(&mut self.inverse_buf)
                .set_local_work_size(self.local_work_size)
                .set_global_work_size(global_work_size)
                .enqueue_nd_range(&self.queue)
                .map_err(|e| GpuError::KernelLaunch {
                    name: "profanity_inverse".to_string(),
                    reason: e.to_string(),
                })?;

            ExecuteKernel::new(&self.point_add_kernel)
                .set_arg(&mut self.points_buf)
                .set_arg(&round)
                .set_local_work_size(self.local_work_size)
                .set_global_work_size(global_work_size)
                .enqueue_nd_range(&self.queue)
                .map_err(|e| GpuError::KernelLaunch {
                    name: "profanity_iterate".to_string(),
                    reason: e.to_string(),
                })?;

            if let Some(transform_kernel) = &self.transform_kernel {
                ExecuteKernel::new(transform_kernel)
                    .set_arg(&mut self.points_buf)
                    .set_local_work_size(self.local_work_size)
                    .set_global_work_size(global_work_size)
                    .enqueue_nd_range(&self.queue)
                    .map_err(|e| GpuError::KernelLaunch {
                        name: "transform".to_string(),
                        reason: e.to_string(),
                    })?;
            }

            ExecuteKernel::new(&self.keccak_kernel)
                .set_arg(&self.points_buf)
                .set_arg(&mut self.hashes_buf)
                .set_local_work_size(self.local_work_size)
                .set_global_work_size(global_work_size)
                .enqueue_nd_range(&self.queue)
                .map_err(|e| GpuError::KernelLaunch {
                    name: "profanity_transform_keccak".to_string(),
                    reason: e.to_string(),
                })?;

            ExecuteKernel::new(&self.score_kernel)
                .set_arg(&self.hashes_buf)
                .set_arg(&self.data1_buf)
                .set_arg(&self.data2_buf)
                .set_arg(&self.best_score_buf)
                .set_arg(&round)
                .set_arg(&mut self.result_bufs[slot])
                .set_arg(&mut self.result_count_bufs[slot])
                .set_local_work_size(self.local_work_size)
                .set_global_work_size(global_work_size)
                .enqueue_nd_range(&self.queue)
                .map_err(|e| GpuError::KernelLaunch {
                    name: self.score_kernel_name.clone(),
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }

    /// Reads back `round`'s hit count and result records from the buffer
    /// slot `round` was enqueued into. Blocks until every command enqueued
    /// before it has completed; since `round` and `round + RESULT_SLOTS`
    /// share a slot, this must be called before `round + RESULT_SLOTS` is
    /// enqueued (true as long as at most `RESULT_SLOTS - 1` rounds are kept
    /// in flight, which is what [`RoundDriver`](crate::round::RoundDriver)
    /// guarantees).
    pub fn collect_results(&self, round: u64) -> Result<Vec<GpuResult>, GpuError> {
        let slot = (round as usize) % RESULT_SLOTS;
        let mut count_out = [0u32];
        unsafe {
            self.queue
                .enqueue_read_buffer(
                    &self.result_count_bufs[slot],
                    CL_BLOCKING,
                    0,
                    &mut count_out,
                    &[],
                )
                .map_err(|e| GpuError::Buffer(e.to_string()))?;
        }

        if count_out[0] as usize > MAX_RESULTS_PER_ROUND as usize {
            eprintln!(
                "warning: score kernel reported {} results, exceeding the {}-result buffer; excess hits were dropped",
                count_out[0], MAX_RESULTS_PER_ROUND
            );
        }

        let num_results = (count_out[0] as usize).min(MAX_RESULTS_PER_ROUND as usize);
        if num_results == 0 {
            return Ok(Vec::new());
        }

        let mut results = vec![GpuResult::default(); num_results];
        let bytes = unsafe {
            std::slice::from_raw_parts_mut(
                results.as_mut_ptr() as *mut u8,
                num_results * std::mem::size_of::<GpuResult>(),
            )
        };
        unsafe {
            self.queue
                .enqueue_read_buffer(&self.result_bufs[slot], CL_BLOCKING, 0, bytes, &[])
                .map_err(|e| GpuError::Buffer(e.to_string()))?;
        }
        Ok(results)
    }

    pub fn inverse_size(&self) -> usize {
        self.inverse_size
    }

    pub fn has_transform(&self) -> bool {
        self.transform_kernel.is_some()
    }

    /// Blocks until every enqueued command on this device's queue has
    /// completed. Called once per device before the dispatcher exits.
    pub fn shutdown(&self) -> Result<(), GpuError> {
        self.queue
            .finish()
            .map_err(|e| GpuError::Buffer(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_results_fits_a_real_batch() {
        assert!(MAX_RESULTS_PER_ROUND > 0);
    }

    #[test]
    fn consecutive_rounds_use_different_result_slots() {
        // two rounds in flight at once must never land in the same slot
        for round in 0u64..10 {
            assert_ne!(
                (round as usize) % RESULT_SLOTS,
                ((round + 1) as usize) % RESULT_SLOTS
            );
        }
    }

    #[test]
    fn gpu_result_layout_is_40_bytes() {
        assert_eq!(std::mem::size_of::<GpuResult>(), 8 + 8 + 4 + 20);
    }

    #[test]
    fn per_lane_buffer_sizes_are_sane() {
        assert!(POINT_STATE_BYTES > 0);
        assert!(INVERSE_STATE_BYTES > 0);
        assert_eq!(HASH_BYTES, 20);
    }
}
