//! wgpu-based GPU compute backend (Metal / Vulkan / DX12).

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::consts::{
    GPU_HISTOGRAM_COPIES, GPU_MAX_WORKGROUPS_PER_DIM, GPU_WORKGROUP_SIZE, HISTOGRAM_BINS,
};
use crate::error::{ContrastError, Result};
use crate::histogram::Histogram;
use crate::rescale::LinearMap;

use super::{select_device, AcceleratorBackend, DeviceDescriptor, DeviceFilter, DeviceKind};

// ---------------------------------------------------------------------------
// Inline WGSL shaders
// ---------------------------------------------------------------------------

/// Bytes arrive packed four to a word. Each workgroup adds into one of
/// `params.copies` private 256-bin slices, summed on the host afterwards.
const HISTOGRAM_WGSL: &str = r"
struct Params { len: u32, copies: u32 }
@group(0) @binding(0) var<storage, read>       input:  array<u32>;
@group(0) @binding(1) var<storage, read_write> bins:   array<atomic<u32>>;
@group(0) @binding(2) var<uniform>             params: Params;
@compute @workgroup_size(256)
fn main(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(workgroup_id) wid: vec3<u32>,
    @builtin(num_workgroups) nwg: vec3<u32>,
) {
    let word = gid.y * nwg.x * 256u + gid.x;
    let first = word * 4u;
    if first >= params.len { return; }
    let base = ((wid.y * nwg.x + wid.x) % params.copies) * 256u;
    let packed = input[word];
    for (var k = 0u; k < 4u; k++) {
        if first + k < params.len {
            let v = (packed >> (k * 8u)) & 0xffu;
            atomicAdd(&bins[base + v], 1u);
        }
    }
}
";

/// Table lookup keeps device output bit-identical to the host map.
const RESCALE_WGSL: &str = r"
struct Params { len: u32, copies: u32 }
@group(0) @binding(0) var<storage, read_write> data:   array<u32>;
@group(0) @binding(1) var<storage, read>       lut:    array<u32>;
@group(0) @binding(2) var<uniform>             params: Params;
@compute @workgroup_size(256)
fn main(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) nwg: vec3<u32>,
) {
    let word = gid.y * nwg.x * 256u + gid.x;
    if word * 4u >= params.len { return; }
    let packed = data[word];
    var out = 0u;
    for (var k = 0u; k < 4u; k++) {
        let v = (packed >> (k * 8u)) & 0xffu;
        out = out | (lut[v] << (k * 8u));
    }
    data[word] = out;
}
";

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct KernelParams {
    len: u32,
    copies: u32,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const fn div_ceil(a: u32, b: u32) -> u32 {
    (a + b - 1) / b
}

/// Workgroup grid covering `len` packed bytes, folded into two dimensions.
fn grid_for(len: u32) -> (u32, u32, u32) {
    let groups = div_ceil(div_ceil(len, 4).max(1), GPU_WORKGROUP_SIZE);
    let x = groups.min(GPU_MAX_WORKGROUPS_PER_DIM);
    (x, div_ceil(groups, x), 1)
}

fn device_kind(ty: wgpu::DeviceType) -> DeviceKind {
    match ty {
        wgpu::DeviceType::DiscreteGpu => DeviceKind::DiscreteGpu,
        wgpu::DeviceType::IntegratedGpu => DeviceKind::IntegratedGpu,
        wgpu::DeviceType::Cpu => DeviceKind::Cpu,
        _ => DeviceKind::Other,
    }
}

/// Copy `bytes` into a buffer padded to a whole number of words.
fn pad_to_words(bytes: &[u8]) -> Vec<u8> {
    let mut padded = Vec::with_capacity(bytes.len().next_multiple_of(4).max(4));
    padded.extend_from_slice(bytes);
    padded.resize(bytes.len().next_multiple_of(4).max(4), 0);
    padded
}

// ---------------------------------------------------------------------------
// WgpuBackend
// ---------------------------------------------------------------------------

/// One opened adapter with its compiled kernels.
struct GpuContext {
    descriptor: DeviceDescriptor,
    device: wgpu::Device,
    queue: wgpu::Queue,
    /// Largest byte segment one dispatch may bind.
    max_segment: usize,
    histogram_pipeline: wgpu::ComputePipeline,
    rescale_pipeline: wgpu::ComputePipeline,
}

pub struct WgpuBackend {
    contexts: Vec<GpuContext>,
}

impl WgpuBackend {
    /// Open every distinct adapter reachable through the power preferences
    /// and the fallback adapter. Fails when none can be opened.
    pub fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let candidates = [
            (wgpu::PowerPreference::HighPerformance, false),
            (wgpu::PowerPreference::LowPower, false),
            (wgpu::PowerPreference::None, true),
        ];

        let mut contexts: Vec<GpuContext> = Vec::new();
        for (power_preference, force_fallback_adapter) in candidates {
            let Ok(adapter) = pollster::block_on(instance.request_adapter(
                &wgpu::RequestAdapterOptions {
                    power_preference,
                    compatible_surface: None,
                    force_fallback_adapter,
                },
            )) else {
                continue;
            };
            let info = adapter.get_info();
            let kind = device_kind(info.device_type);
            if contexts
                .iter()
                .any(|c| c.descriptor.name == info.name && c.descriptor.kind == kind)
            {
                continue;
            }
            match GpuContext::open(&adapter) {
                Ok(ctx) => {
                    tracing::info!(
                        name = %ctx.descriptor.name,
                        kind = %ctx.descriptor.kind,
                        "GPU adapter opened"
                    );
                    contexts.push(ctx);
                }
                Err(e) => tracing::warn!("skipping adapter {}: {e}", info.name),
            }
        }

        if contexts.is_empty() {
            return Err(ContrastError::DeviceUnavailable(
                "no suitable GPU adapter found".into(),
            ));
        }
        Ok(Self { contexts })
    }

    /// Descriptors of every opened adapter, in probe order.
    pub fn devices(&self) -> Vec<DeviceDescriptor> {
        self.contexts.iter().map(|c| c.descriptor.clone()).collect()
    }

    fn context(&self, device: &DeviceDescriptor) -> Result<&GpuContext> {
        self.contexts
            .iter()
            .find(|c| c.descriptor == *device)
            .ok_or_else(|| {
                ContrastError::DeviceUnavailable(format!("{} is not open", device.name))
            })
    }
}

impl GpuContext {
    fn open(adapter: &wgpu::Adapter) -> Result<Self> {
        let info = adapter.get_info();
        let limits = adapter.limits();

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("autocontrast"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            },
        ))
        .map_err(|e| ContrastError::Gpu(format!("failed to create GPU device: {e}")))?;

        let mk = |label, src: &str| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(src.into()),
            })
        };
        let hist_mod = mk("histogram", HISTOGRAM_WGSL);
        let rescale_mod = mk("rescale", RESCALE_WGSL);

        let pipe = |module: &wgpu::ShaderModule| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: None,
                layout: None,
                module,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            })
        };
        let histogram_pipeline = pipe(&hist_mod);
        let rescale_pipeline = pipe(&rescale_mod);

        let binding_limit = wgpu::Limits::default().max_storage_buffer_binding_size as usize;
        let max_segment = binding_limit.min(u32::MAX as usize) & !3;

        Ok(Self {
            descriptor: DeviceDescriptor {
                name: info.name.clone(),
                compute_units: GPU_HISTOGRAM_COPIES,
                max_group_size: limits.max_compute_workgroup_size_x as usize,
                kind: device_kind(info.device_type),
            },
            device,
            queue,
            max_segment,
            histogram_pipeline,
            rescale_pipeline,
        })
    }

    // --- Buffer helpers ---

    fn create_storage(&self, contents: &[u8]) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: None,
                contents,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
            })
    }

    fn create_uniform<T: Pod>(&self, data: &T) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: None,
                contents: bytemuck::bytes_of(data),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
    }

    fn download(&self, buffer: &wgpu::Buffer) -> Result<Vec<u8>> {
        let size = buffer.size();
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: None,
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut enc = self.device.create_command_encoder(&Default::default());
        enc.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
        self.queue.submit(std::iter::once(enc.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        slice.map_async(wgpu::MapMode::Read, move |r| {
            tx.send(r).ok();
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| ContrastError::Gpu(format!("device poll failed: {e}")))?;
        rx.recv()
            .map_err(|e| ContrastError::Gpu(format!("GPU channel closed: {e}")))?
            .map_err(|e| ContrastError::Gpu(format!("buffer mapping failed: {e}")))?;

        let data = slice.get_mapped_range();
        let result = data.to_vec();
        drop(data);
        staging.unmap();
        Ok(result)
    }

    /// Dispatch a single compute pass with one bind group at group(0).
    fn dispatch(
        &self,
        pipeline: &wgpu::ComputePipeline,
        entries: &[wgpu::BindGroupEntry],
        workgroups: (u32, u32, u32),
    ) {
        let layout = pipeline.get_bind_group_layout(0);
        let bg = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout: &layout,
            entries,
        });
        let mut enc = self.device.create_command_encoder(&Default::default());
        {
            let mut pass = enc.begin_compute_pass(&Default::default());
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bg, &[]);
            pass.dispatch_workgroups(workgroups.0, workgroups.1, workgroups.2);
        }
        self.queue.submit(std::iter::once(enc.finish()));
    }

    // --- Kernels ---

    fn histogram_segment(&self, segment: &[u8], hist: &mut Histogram) -> Result<()> {
        let copies = self.descriptor.compute_units.max(1);
        let len = segment.len() as u32;

        let input = self.create_storage(&pad_to_words(segment));
        let zeros = vec![0u8; HISTOGRAM_BINS * copies as usize * 4];
        let bins = self.create_storage(&zeros);
        let params = self.create_uniform(&KernelParams { len, copies });

        self.dispatch(
            &self.histogram_pipeline,
            &[
                wgpu::BindGroupEntry { binding: 0, resource: input.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: bins.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: params.as_entire_binding() },
            ],
            grid_for(len),
        );

        let raw = self.download(&bins)?;
        let counts: &[u32] = bytemuck::cast_slice(&raw);
        for slice in counts.chunks_exact(HISTOGRAM_BINS) {
            let mut table = [0u64; HISTOGRAM_BINS];
            for (dst, &src) in table.iter_mut().zip(slice) {
                *dst = u64::from(src);
            }
            hist.merge(&table);
        }
        Ok(())
    }

    fn rescale_segment(&self, segment: &mut [u8], lut: &wgpu::Buffer) -> Result<()> {
        let len = segment.len() as u32;
        let data = self.create_storage(&pad_to_words(segment));
        let params = self.create_uniform(&KernelParams { len, copies: 1 });

        self.dispatch(
            &self.rescale_pipeline,
            &[
                wgpu::BindGroupEntry { binding: 0, resource: data.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: lut.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: params.as_entire_binding() },
            ],
            grid_for(len),
        );

        let raw = self.download(&data)?;
        segment.copy_from_slice(&raw[..segment.len()]);
        Ok(())
    }
}

impl AcceleratorBackend for WgpuBackend {
    fn name(&self) -> &str {
        "GPU/wgpu"
    }

    fn supports(&self, filter: DeviceFilter, index: usize) -> Option<DeviceDescriptor> {
        select_device(&self.devices(), filter, index)
    }

    fn build_histogram(&self, bytes: &[u8], device: &DeviceDescriptor) -> Result<Histogram> {
        let ctx = self.context(device)?;
        let mut hist = Histogram::new();
        for segment in bytes.chunks(ctx.max_segment) {
            ctx.histogram_segment(segment, &mut hist)?;
        }
        Ok(hist)
    }

    fn apply_rescale(
        &self,
        bytes: &mut [u8],
        device: &DeviceDescriptor,
        map: &LinearMap,
    ) -> Result<()> {
        let ctx = self.context(device)?;
        let table: Vec<u32> = map.lookup_table().iter().map(|&v| u32::from(v)).collect();
        let lut = ctx.create_storage(bytemuck::cast_slice(&table));
        for segment in bytes.chunks_mut(ctx.max_segment) {
            ctx.rescale_segment(segment, &lut)?;
        }
        Ok(())
    }
}
