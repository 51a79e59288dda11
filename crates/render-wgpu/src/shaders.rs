/// WGSL shader for the HDR scene pass: instanced meshes under flat ambient
/// lighting plus emission.
pub const SCENE_SHADER: &str = r#"
struct FrameUniforms {
    view_proj: mat4x4<f32>,
    ambient: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> frame: FrameUniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
};

struct InstanceInput {
    @location(2) model_0: vec4<f32>,
    @location(3) model_1: vec4<f32>,
    @location(4) model_2: vec4<f32>,
    @location(5) model_3: vec4<f32>,
    @location(6) diffuse: vec4<f32>,
    @location(7) emissive: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> VertexOutput {
    let model = mat4x4<f32>(
        instance.model_0,
        instance.model_1,
        instance.model_2,
        instance.model_3,
    );
    let world_pos = model * vec4<f32>(vertex.position, 1.0);

    var out: VertexOutput;
    out.clip_position = frame.view_proj * world_pos;
    let lit = instance.diffuse.rgb * frame.ambient.rgb + instance.emissive.rgb;
    out.color = vec4<f32>(lit, instance.diffuse.a);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;

/// WGSL shader for the luminosity high pass: texels whose luma clears the
/// threshold survive, the rest fade to black over the smooth width.
pub const BRIGHT_SHADER: &str = r#"
struct BrightParams {
    threshold: f32,
    smooth_width: f32,
};

@group(0) @binding(0)
var color_texture: texture_2d<f32>;
@group(0) @binding(1)
var color_sampler: sampler;
@group(0) @binding(2)
var<uniform> params: BrightParams;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOutput {
    let corner = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: VertexOutput;
    out.clip_position = vec4<f32>(corner * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(corner.x, 1.0 - corner.y);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let texel = textureSampleLevel(color_texture, color_sampler, in.uv, 0.0);
    let luma = dot(texel.rgb, vec3<f32>(0.299, 0.587, 0.114));
    let keep = smoothstep(params.threshold, params.threshold + params.smooth_width, luma);
    return mix(vec4<f32>(0.0), texel, keep);
}
"#;

/// WGSL shader for one direction of the separable Gaussian blur. Offsets
/// step in units of the level's texel size; the kernel is normalized by the
/// accumulated weight.
pub const BLUR_SHADER: &str = r#"
struct BlurParams {
    direction: vec2<f32>,
    inv_size: vec2<f32>,
    sigma: f32,
    radius: f32,
};

@group(0) @binding(0)
var color_texture: texture_2d<f32>;
@group(0) @binding(1)
var color_sampler: sampler;
@group(0) @binding(2)
var<uniform> params: BlurParams;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOutput {
    let corner = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: VertexOutput;
    out.clip_position = vec4<f32>(corner * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(corner.x, 1.0 - corner.y);
    return out;
}

fn gaussian(x: f32, sigma: f32) -> f32 {
    return 0.39894 * exp(-0.5 * x * x / (sigma * sigma)) / sigma;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var weight_sum = gaussian(0.0, params.sigma);
    var color_sum = textureSampleLevel(color_texture, color_sampler, in.uv, 0.0).rgb * weight_sum;
    for (var i = 1.0; i < params.radius; i += 1.0) {
        let weight = gaussian(i, params.sigma);
        let offset = params.direction * params.inv_size * i;
        let forward = textureSampleLevel(color_texture, color_sampler, in.uv + offset, 0.0).rgb;
        let backward = textureSampleLevel(color_texture, color_sampler, in.uv - offset, 0.0).rgb;
        color_sum += (forward + backward) * weight;
        weight_sum += 2.0 * weight;
    }
    return vec4<f32>(color_sum / weight_sum, 1.0);
}
"#;

/// WGSL shader combining the five blurred pyramid levels into one bloom
/// image, each level scaled by its precomputed weight.
pub const COMPOSITE_SHADER: &str = r#"
struct CompositeParams {
    weights0: vec4<f32>,
    weights1: vec4<f32>,
};

@group(0) @binding(0)
var blur_0: texture_2d<f32>;
@group(0) @binding(1)
var blur_1: texture_2d<f32>;
@group(0) @binding(2)
var blur_2: texture_2d<f32>;
@group(0) @binding(3)
var blur_3: texture_2d<f32>;
@group(0) @binding(4)
var blur_4: texture_2d<f32>;
@group(0) @binding(5)
var color_sampler: sampler;
@group(0) @binding(6)
var<uniform> params: CompositeParams;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOutput {
    let corner = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: VertexOutput;
    out.clip_position = vec4<f32>(corner * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(corner.x, 1.0 - corner.y);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let sum = params.weights0.x * textureSampleLevel(blur_0, color_sampler, in.uv, 0.0).rgb
        + params.weights0.y * textureSampleLevel(blur_1, color_sampler, in.uv, 0.0).rgb
        + params.weights0.z * textureSampleLevel(blur_2, color_sampler, in.uv, 0.0).rgb
        + params.weights0.w * textureSampleLevel(blur_3, color_sampler, in.uv, 0.0).rgb
        + params.weights1.x * textureSampleLevel(blur_4, color_sampler, in.uv, 0.0).rgb;
    return vec4<f32>(sum, 1.0);
}
"#;

/// WGSL shader for the final output: base scene plus bloom, then
/// exposure-scaled Reinhard tone mapping. sRGB encoding is left to the
/// surface format.
pub const OUTPUT_SHADER: &str = r#"
struct OutputParams {
    exposure: f32,
};

@group(0) @binding(0)
var scene_texture: texture_2d<f32>;
@group(0) @binding(1)
var bloom_texture: texture_2d<f32>;
@group(0) @binding(2)
var color_sampler: sampler;
@group(0) @binding(3)
var<uniform> params: OutputParams;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOutput {
    let corner = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: VertexOutput;
    out.clip_position = vec4<f32>(corner * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(corner.x, 1.0 - corner.y);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let base = textureSampleLevel(scene_texture, color_sampler, in.uv, 0.0).rgb;
    let bloom = textureSampleLevel(bloom_texture, color_sampler, in.uv, 0.0).rgb;
    let scaled = (base + bloom) * params.exposure;
    let mapped = saturate(scaled / (vec3<f32>(1.0) + scaled));
    return vec4<f32>(mapped, 1.0);
}
"#;
