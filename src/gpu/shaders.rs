// ============================================================================
// GPU SHADERS — WGSL kept inline
// ============================================================================

// ============================================================================
// VIEW SHADER — projects the flattened canvas through the view transform
// ============================================================================
//
// The quad's corners are the canvas in its own NDC (-1..1).  The uniform is
// the 3x3 affine from canvas NDC to screen NDC, so pan, zoom, rotation, flip
// and aspect fit all happen in the vertex shader.  Texture v runs top-down
// while NDC y runs bottom-up, hence the flip in `uv`.
pub const VIEW_SHADER: &str = r#"
struct ViewUniforms {
    transform: mat3x3<f32>,
};

@group(0) @binding(0) var<uniform> u: ViewUniforms;
@group(1) @binding(0) var canvas_tex: texture_2d<f32>;
@group(1) @binding(1) var canvas_samp: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_view(@builtin(vertex_index) vi: u32) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>( 1.0,  1.0),
    );
    let corner = corners[vi];
    let screen = u.transform * vec3<f32>(corner, 1.0);

    var out: VertexOutput;
    out.position = vec4<f32>(screen.xy, 0.0, 1.0);
    out.uv = vec2<f32>((corner.x + 1.0) * 0.5, (1.0 - corner.y) * 0.5);
    return out;
}

@fragment
fn fs_view(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(canvas_tex, canvas_samp, in.uv);
}
"#;
