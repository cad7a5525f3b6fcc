/// Shared bindings for every pass. Layouts match `FrameUniforms` and
/// `ObjectUniforms`.
const COMMON: &str = r#"
struct Frame {
    view_proj: mat4x4<f32>,
    inv_view_proj: mat4x4<f32>,
    camera_pos: vec4<f32>,
    light_dir: array<vec4<f32>, 4>,
    light_color: array<vec4<f32>, 4>,
    // x: light count, y: exposure, z: environment present, w: view winding
    params: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> frame: Frame;
@group(0) @binding(1)
var env_map: texture_cube<f32>;
@group(0) @binding(2)
var env_sampler: sampler;
"#;

/// Mesh pass: unlit or Lambert plus environment reflection.
const MESH: &str = r#"
struct Object {
    model: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
    base_color: vec4<f32>,
    // x: metallic, y: roughness, z: env intensity, w: lit
    params: vec4<f32>,
    // x: model winding
    flags: vec4<f32>,
};

@group(1) @binding(0)
var<uniform> object: Object;
@group(2) @binding(0)
var base_map: texture_2d<f32>;
@group(2) @binding(1)
var base_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

@vertex
fn vs_main(vertex: VertexInput) -> VertexOutput {
    let world = object.model * vec4<f32>(vertex.position, 1.0);

    var out: VertexOutput;
    out.clip_position = frame.view_proj * world;
    out.world_pos = world.xyz;
    out.world_normal = (object.normal_matrix * vec4<f32>(vertex.normal, 0.0)).xyz;
    out.uv = vertex.uv;
    return out;
}

@fragment
fn fs_main(in: VertexOutput, @builtin(front_facing) front: bool) -> @location(0) vec4<f32> {
    let albedo = object.base_color * textureSample(base_map, base_sampler, in.uv);

    // Geometric facing, undoing mirrored views and mirrored models.
    let facing = select(-1.0, 1.0, front) * frame.params.w * object.flags.x;
    let n0 = normalize(in.world_normal);
    let n = select(-n0, n0, facing > 0.0);

    var direct = vec3<f32>(0.0);
    let count = u32(frame.params.x);
    for (var i = 0u; i < count; i = i + 1u) {
        let light = frame.light_dir[i];
        direct = direct + frame.light_color[i].rgb * light.w * max(dot(n, light.xyz), 0.0);
    }

    let view_dir = normalize(in.world_pos - frame.camera_pos.xyz);
    let irradiance = textureSample(env_map, env_sampler, n).rgb * frame.params.z;
    let specular = textureSample(env_map, env_sampler, reflect(view_dir, n)).rgb * frame.params.z;

    let metallic = object.params.x;
    let roughness = object.params.y;
    let diffuse_weight = 1.0 - metallic;
    let reflectance = mix(vec3<f32>(0.04), albedo.rgb, metallic) * (1.0 - 0.75 * roughness);
    let lit = albedo.rgb * direct * diffuse_weight
        + (albedo.rgb * irradiance * diffuse_weight + reflectance * specular) * object.params.z;

    let color = select(albedo.rgb, lit, object.params.w > 0.5);
    return vec4<f32>(color * frame.params.y, albedo.a);
}
"#;

/// Background pass: full-screen triangle sampling the environment along
/// each view ray.
const SKY: &str = r#"
struct SkyOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) ndc: vec2<f32>,
};

@vertex
fn vs_sky(@builtin(vertex_index) index: u32) -> SkyOutput {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    let ndc = uv * 2.0 - 1.0;

    var out: SkyOutput;
    out.clip_position = vec4<f32>(ndc, 1.0, 1.0);
    out.ndc = ndc;
    return out;
}

@fragment
fn fs_sky(in: SkyOutput) -> @location(0) vec4<f32> {
    let far = frame.inv_view_proj * vec4<f32>(in.ndc, 1.0, 1.0);
    let dir = far.xyz / far.w - frame.camera_pos.xyz;
    let color = textureSample(env_map, env_sampler, dir).rgb * frame.params.z;
    return vec4<f32>(color * frame.params.y, 1.0);
}
"#;

pub(crate) fn mesh_source() -> String {
    format!("{COMMON}{MESH}")
}

pub(crate) fn sky_source() -> String {
    format!("{COMMON}{SKY}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_share_frame_bindings() {
        for src in [mesh_source(), sky_source()] {
            assert!(src.contains("var<uniform> frame: Frame;"));
            assert!(src.contains("texture_cube<f32>"));
        }
        assert!(mesh_source().contains("fn fs_main"));
        assert!(sky_source().contains("fn vs_sky"));
    }
}
