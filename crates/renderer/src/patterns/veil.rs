/// Layered simplex noise with scanlines, hue rotation, and a vignette.
pub struct DarkVeil;

impl DarkVeil {
    /// Alpha written by every fragment.
    pub const OPACITY: f32 = 0.95;

    pub const FRAGMENT_SHADER: &'static str = r#"#version 450
layout(location = 0) in vec2 vUv;
layout(location = 0) out vec4 fragColor;

layout(set = 0, binding = 0) uniform Params {
    float uTime;
    float uSpeed;
    float uHueShift;
    float uNoiseIntensity;
    float uScanlineIntensity;
    float uDistortionAmount;
    float uColorShift;
};

vec3 mod289v3(vec3 x) {
    return x - floor(x * (1.0 / 289.0)) * 289.0;
}

vec2 mod289v2(vec2 x) {
    return x - floor(x * (1.0 / 289.0)) * 289.0;
}

vec3 permute(vec3 x) {
    return mod289v3((x * 34.0 + vec3(1.0)) * x);
}

float snoise(vec2 v) {
    vec4 C = vec4(0.211324865405187, 0.366025403784439, -0.577350269189626, 0.024390243902439);
    vec2 i = floor(v + vec2(dot(v, C.yy)));
    vec2 x0 = v - i + vec2(dot(i, C.xx));

    float upper = step(x0.y, x0.x);
    vec2 i1 = vec2(upper, 1.0 - upper);
    vec2 x1 = x0 - i1 + C.xx;
    vec2 x2 = x0 + C.zz;

    i = mod289v2(i);
    vec3 p = permute(permute(vec3(i.y) + vec3(0.0, i1.y, 1.0)) + vec3(i.x) + vec3(0.0, i1.x, 1.0));

    vec3 m = max(vec3(0.5) - vec3(dot(x0, x0), dot(x1, x1), dot(x2, x2)), vec3(0.0));
    m = m * m;
    m = m * m;

    vec3 x = 2.0 * fract(p * C.www) - vec3(1.0);
    vec3 h = abs(x) - vec3(0.5);
    vec3 ox = floor(x + vec3(0.5));
    vec3 a0 = x - ox;
    m = m * (vec3(1.79284291400159) - 0.85373472095314 * (a0 * a0 + h * h));

    vec3 g = vec3(a0.x * x0.x + h.x * x0.y, a0.y * x1.x + h.y * x1.y, a0.z * x2.x + h.z * x2.y);
    return 130.0 * dot(m, g);
}

vec3 rgb2hsv(vec3 c) {
    vec4 K = vec4(0.0, -1.0 / 3.0, 2.0 / 3.0, -1.0);
    vec4 p = mix(vec4(c.z, c.y, K.w, K.z), vec4(c.y, c.z, K.x, K.y), vec4(step(c.z, c.y)));
    vec4 q = mix(vec4(p.x, p.y, p.w, c.x), vec4(c.x, p.y, p.z, p.x), vec4(step(p.x, c.x)));
    float d = q.x - min(q.w, q.y);
    float e = 1.0e-10;
    return vec3(abs(q.z + (q.w - q.y) / (6.0 * d + e)), d / (q.x + e), q.x);
}

vec3 hsv2rgb(vec3 c) {
    vec3 p = abs(fract(vec3(c.x) + vec3(1.0, 2.0 / 3.0, 1.0 / 3.0)) * 6.0 - vec3(3.0));
    vec3 rgb = clamp(p - vec3(1.0), vec3(0.0), vec3(1.0));
    return c.z * mix(vec3(1.0), rgb, vec3(c.y));
}

void main() {
    vec2 uv = vUv;
    float t = uTime * uSpeed;

    float distortion = snoise(uv * 3.0 + vec2(t * 0.5)) * uDistortionAmount;
    uv = uv + vec2(distortion * 0.1);

    float n = snoise(uv * 5.0 + vec2(t));
    n += snoise(uv * 10.0 + vec2(t * 0.5)) * 0.5;
    n += snoise(uv * 20.0 - vec2(t * 0.3)) * 0.25;
    n = n * 0.5 + 0.5;

    float scanlines = sin(uv.y * 200.0) * uScanlineIntensity;
    vec3 color = vec3(n * uNoiseIntensity + scanlines);

    vec3 hsv = rgb2hsv(color);
    hsv = vec3(fract(hsv.x + uHueShift + uColorShift * 0.1), hsv.y, hsv.z);
    color = hsv2rgb(hsv);

    float vignette = 1.0 - smoothstep(0.0, 1.0, length(uv - vec2(0.5)) * 1.5);
    color *= vignette;

    fragColor = vec4(color, 0.95);
}
"#;
}
