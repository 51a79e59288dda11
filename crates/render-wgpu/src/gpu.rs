use std::collections::BTreeMap;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use turntable_assets::{LoadedModel, MtlMaterial};
use turntable_common::AssetId;
use turntable_render::{BloomSettings, StageExecutor, TargetVersion};
use turntable_scene::{Camera, NodeKind, SceneGraph};
use wgpu::util::DeviceExt;

use crate::shaders;
use crate::targets::{FilterChain, HDR_FORMAT, OutputParams, PassTargets};

/// Upper bound on mesh draws per frame; extra scene nodes are dropped.
const MAX_MESH_INSTANCES: usize = 64;

/// Failures surfaced by the GPU stages.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("composition ran without a staged output view")]
    NoOutput,
    #[error("bloom target is stale (expected {expected:?}, got {got:?})")]
    StaleBloom {
        expected: TargetVersion,
        got: TargetVersion,
    },
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct FrameUniforms {
    view_proj: [[f32; 4]; 4],
    ambient: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
    normal: [f32; 3],
}

impl Vertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct InstanceData {
    model_0: [f32; 4],
    model_1: [f32; 4],
    model_2: [f32; 4],
    model_3: [f32; 4],
    diffuse: [f32; 4],
    emissive: [f32; 4],
}

impl InstanceData {
    const ATTRIBS: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
        2 => Float32x4,
        3 => Float32x4,
        4 => Float32x4,
        5 => Float32x4,
        6 => Float32x4,
        7 => Float32x4
    ];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Geometry and material constants resident on the device.
struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    diffuse: [f32; 4],
    emissive: [f32; 4],
}

/// GPU implementation of both bloom stages.
///
/// Owns the device and queue so the stages can be driven through the
/// backend-free executor trait; the caller keeps the surface and stages one
/// output view per frame with [`WgpuExecutor::set_output`].
pub struct WgpuExecutor {
    device: wgpu::Device,
    queue: wgpu::Queue,
    scene_pipeline: wgpu::RenderPipeline,
    bright_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    composite_pipeline: wgpu::RenderPipeline,
    output_pipeline: wgpu::RenderPipeline,
    frame_buffer: wgpu::Buffer,
    instance_buffer: wgpu::Buffer,
    scene_bind_group: wgpu::BindGroup,
    chain: FilterChain,
    targets: PassTargets,
    meshes: BTreeMap<AssetId, GpuMesh>,
    output: Option<wgpu::TextureView>,
    version: u64,
}

impl WgpuExecutor {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        settings: BloomSettings,
    ) -> Self {
        // Frame uniforms
        let frame_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("frame uniforms"),
            contents: bytemuck::bytes_of(&FrameUniforms {
                view_proj: Mat4::IDENTITY.to_cols_array_2d(),
                ambient: [0.0, 0.0, 0.0, 1.0],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("instances"),
            size: (MAX_MESH_INSTANCES * std::mem::size_of::<InstanceData>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let scene_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene bind group layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene bind group"),
            layout: &scene_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let chain = FilterChain::new(&device, settings, width, height);
        let targets = PassTargets::new(&device, &chain, width, height);

        let scene_pipeline = create_scene_pipeline(&device, &scene_layout);
        let bright_pipeline = create_filter_pipeline(
            &device,
            "bright pipeline",
            &chain.filter_layout,
            shaders::BRIGHT_SHADER,
            HDR_FORMAT,
        );
        let blur_pipeline = create_filter_pipeline(
            &device,
            "blur pipeline",
            &chain.filter_layout,
            shaders::BLUR_SHADER,
            HDR_FORMAT,
        );
        let composite_pipeline = create_filter_pipeline(
            &device,
            "composite pipeline",
            &chain.composite_layout,
            shaders::COMPOSITE_SHADER,
            HDR_FORMAT,
        );
        let output_pipeline = create_filter_pipeline(
            &device,
            "output pipeline",
            &chain.output_layout,
            shaders::OUTPUT_SHADER,
            surface_format,
        );

        tracing::info!(width, height, format = ?surface_format, "gpu executor ready");

        Self {
            device,
            queue,
            scene_pipeline,
            bright_pipeline,
            blur_pipeline,
            composite_pipeline,
            output_pipeline,
            frame_buffer,
            instance_buffer,
            scene_bind_group,
            chain,
            targets,
            meshes: BTreeMap::new(),
            output: None,
            version: 0,
        }
    }

    /// Device handle for surface configuration.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Rebuild the size-dependent pass targets after a surface resize.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.targets = PassTargets::new(&self.device, &self.chain, width, height);
        self.chain.write_blur_params(&self.queue, width, height);
        tracing::debug!(width, height, "pass targets rebuilt");
    }

    /// Stage the view the next composition writes to. A staged view is
    /// consumed by exactly one composition; staging again replaces it.
    pub fn set_output(&mut self, view: wgpu::TextureView) {
        self.output = Some(view);
    }

    /// Upload a model's geometry and material constants, keyed by its
    /// content-derived handle. Re-uploading the same handle replaces the
    /// previous buffers.
    pub fn upload_model(&mut self, model: &LoadedModel) -> AssetId {
        let vertices: Vec<Vertex> = model
            .mesh
            .vertices
            .iter()
            .map(|v| Vertex {
                position: v.position,
                normal: v.normal,
            })
            .collect();
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("model vertices"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("model indices"),
                contents: bytemuck::cast_slice(&model.mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        let (diffuse, emissive) = material_colors(&model.material);
        tracing::debug!(
            asset = model.asset.0,
            vertices = vertices.len(),
            indices = model.mesh.indices.len(),
            "mesh uploaded"
        );
        self.meshes.insert(
            model.asset,
            GpuMesh {
                vertex_buffer,
                index_buffer,
                index_count: model.mesh.indices.len() as u32,
                diffuse,
                emissive,
            },
        );
        model.asset
    }

    /// Write per-frame uniforms and instance data; returns the draw order.
    fn prepare_scene(&self, scene: &SceneGraph, camera: &Camera) -> Vec<AssetId> {
        let ambient = scene.ambient_color();
        let frame = FrameUniforms {
            view_proj: camera.view_projection().to_cols_array_2d(),
            ambient: [ambient.x, ambient.y, ambient.z, 1.0],
        };
        self.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&frame));

        let meshes = &self.meshes;
        let mut instances: Vec<InstanceData> = Vec::new();
        let mut draws: Vec<AssetId> = Vec::new();
        scene.visit(|node, world| {
            if let NodeKind::Mesh { asset } = node.kind
                && let Some(mesh) = meshes.get(&asset)
            {
                instances.push(mesh_instance(world, mesh));
                draws.push(asset);
            }
        });
        instances.truncate(MAX_MESH_INSTANCES);
        draws.truncate(MAX_MESH_INSTANCES);
        if !instances.is_empty() {
            self.queue
                .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
        }
        draws
    }

    /// Render every visible mesh into `target` with depth testing.
    fn encode_scene_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        draws: &[AssetId],
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.targets.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });
        pass.set_pipeline(&self.scene_pipeline);
        pass.set_bind_group(0, &self.scene_bind_group, &[]);
        pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
        for (slot, asset) in draws.iter().enumerate() {
            let Some(mesh) = self.meshes.get(asset) else {
                continue;
            };
            let slot = slot as u32;
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, slot..slot + 1);
        }
    }
}

impl StageExecutor for WgpuExecutor {
    type Error = RenderError;

    fn run_extraction(
        &mut self,
        scene: &SceneGraph,
        camera: &Camera,
    ) -> Result<TargetVersion, RenderError> {
        let draws = self.prepare_scene(scene, camera);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("extraction encoder"),
            });

        self.encode_scene_pass(&mut encoder, &self.targets.extract_view, &draws);
        fullscreen_pass(
            &mut encoder,
            "bright pass",
            &self.bright_pipeline,
            &self.targets.bright_group,
            &self.targets.bright_view,
        );
        for (index, group) in self.targets.blur_groups.iter().enumerate() {
            let level = index / 2;
            let target = if index % 2 == 0 {
                &self.targets.horizontal_views[level]
            } else {
                &self.targets.vertical_views[level]
            };
            fullscreen_pass(&mut encoder, "blur pass", &self.blur_pipeline, group, target);
        }
        fullscreen_pass(
            &mut encoder,
            "composite pass",
            &self.composite_pipeline,
            &self.targets.composite_group,
            &self.targets.bloom_view,
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        self.version += 1;
        Ok(TargetVersion(self.version))
    }

    fn run_composition(
        &mut self,
        scene: &SceneGraph,
        camera: &Camera,
        bloom: TargetVersion,
        exposure: f32,
    ) -> Result<(), RenderError> {
        let expected = TargetVersion(self.version);
        if bloom != expected {
            return Err(RenderError::StaleBloom {
                expected,
                got: bloom,
            });
        }
        let output = self.output.take().ok_or(RenderError::NoOutput)?;

        let draws = self.prepare_scene(scene, camera);
        self.queue.write_buffer(
            &self.chain.output_params,
            0,
            bytemuck::bytes_of(&OutputParams {
                exposure,
                _pad: [0.0; 3],
            }),
        );
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("composition encoder"),
            });
        self.encode_scene_pass(&mut encoder, &self.targets.base_view, &draws);
        fullscreen_pass(
            &mut encoder,
            "output pass",
            &self.output_pipeline,
            &self.targets.output_group,
            &output,
        );
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

fn mesh_instance(world: Mat4, mesh: &GpuMesh) -> InstanceData {
    let cols = world.to_cols_array_2d();
    InstanceData {
        model_0: cols[0],
        model_1: cols[1],
        model_2: cols[2],
        model_3: cols[3],
        diffuse: mesh.diffuse,
        emissive: mesh.emissive,
    }
}

/// Material constants as shader vectors. The diffuse alpha carries the
/// dissolve (`d`); emission adds on top and stays opaque.
fn material_colors(material: &MtlMaterial) -> ([f32; 4], [f32; 4]) {
    let kd = material.diffuse;
    let ke = material.emission;
    ([kd.x, kd.y, kd.z, material.dissolve], [ke.x, ke.y, ke.z, 1.0])
}

/// One full-screen triangle through `pipeline` into `target`.
fn fullscreen_pass(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
    target: &wgpu::TextureView,
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        ..Default::default()
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.draw(0..3, 0..1);
}

fn create_scene_pipeline(
    device: &wgpu::Device,
    scene_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("scene pipeline layout"),
        bind_group_layouts: &[scene_layout],
        push_constant_ranges: &[],
    });
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("scene shader"),
        source: wgpu::ShaderSource::Wgsl(shaders::SCENE_SHADER.into()),
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("scene pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[Vertex::layout(), InstanceData::layout()],
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: HDR_FORMAT,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: Some(wgpu::Face::Back),
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: wgpu::TextureFormat::Depth32Float,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn create_filter_pipeline(
    device: &wgpu::Device,
    label: &str,
    bind_layout: &wgpu::BindGroupLayout,
    source: &str,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[bind_layout],
        push_constant_ranges: &[],
    });
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn dissolve_rides_in_the_diffuse_alpha() {
        let material = MtlMaterial {
            diffuse: Vec3::new(0.8, 0.2, 0.2),
            dissolve: 0.25,
            ..MtlMaterial::default()
        };
        let (diffuse, emissive) = material_colors(&material);
        assert_eq!(diffuse, [0.8, 0.2, 0.2, 0.25]);
        assert_eq!(emissive[3], 1.0);
    }

    #[test]
    fn default_material_is_opaque() {
        let (diffuse, _) = material_colors(&MtlMaterial::default());
        assert_eq!(diffuse[3], 1.0);
    }
}
