/// Wavy horizontal lines, each tinted with its own hue.
pub struct FloatingLines;

impl FloatingLines {
    /// Upper bound on the shader's line loop.
    pub const MAX_LINES: u32 = 20;

    /// Number of loop iterations the fragment shader runs for `line_count`.
    ///
    /// Mirrors the shader's `float(i) >= uLineCount` break inside a loop capped
    /// at [`FloatingLines::MAX_LINES`].
    pub fn active_lines(line_count: f32) -> u32 {
        if line_count.is_nan() || line_count <= 0.0 {
            return 0;
        }
        line_count.ceil().min(Self::MAX_LINES as f32) as u32
    }

    pub const FRAGMENT_SHADER: &'static str = r#"#version 450
layout(location = 0) in vec2 vUv;
layout(location = 0) out vec4 fragColor;

layout(set = 0, binding = 0) uniform Params {
    float uTime;
    float uSpeed;
    float uLineCount;
    float uLineWidth;
    float uIntensity;
    float uColorShift;
    float uWaveAmplitude;
};

float floatingLine(vec2 uv, float lineIndex, float time) {
    float count = max(uLineCount, 1.0);
    float waveX = sin(lineIndex * 0.5 + time * uSpeed * 0.3) * 0.3;
    float lineY = lineIndex / count + waveX;
    lineY += sin(uv.x * 3.0 + time * uSpeed * 0.5 + lineIndex) * uWaveAmplitude * 0.05;

    float dist = abs(uv.y - lineY);
    float width = max(uLineWidth * 0.002, 0.0001);
    float line = 1.0 - smoothstep(0.0, width, dist);
    float glow = exp(-dist * 20.0) * 0.3;
    return line + glow;
}

vec3 hsl2rgb(vec3 c) {
    vec3 k = mod(vec3(c.x * 6.0) + vec3(0.0, 4.0, 2.0), vec3(6.0));
    vec3 rgb = clamp(abs(k - vec3(3.0)) - vec3(1.0), vec3(0.0), vec3(1.0));
    return vec3(c.z) + c.y * (rgb - vec3(0.5)) * (1.0 - abs(2.0 * c.z - 1.0));
}

void main() {
    vec2 uv = vUv;
    vec3 color = vec3(0.0);
    float count = max(uLineCount, 1.0);

    // Loop bound must stay constant; uLineCount only breaks early.
    for (int i = 0; i < 20; i++) {
        float fi = float(i);
        if (fi >= uLineCount) {
            break;
        }
        float line = floatingLine(uv, fi, uTime);
        float hue = fract(fi / count + uColorShift * 0.1 + uTime * uSpeed * 0.05);
        vec3 lineColor = hsl2rgb(vec3(hue, 0.7, 0.5));
        color += lineColor * (line * uIntensity);
    }

    float flow = sin(uv.y * 15.0 + uTime * uSpeed * 0.2) * 0.1;
    color += vec3(flow * 0.1);

    float edge = 1.0 - smoothstep(0.0, 1.0, length(uv - vec2(0.5)) * 1.2);
    color *= edge;

    fragColor = vec4(color, 1.0);
}
"#;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_lines_is_bounded() {
        assert_eq!(FloatingLines::active_lines(0.0), 0);
        assert_eq!(FloatingLines::active_lines(-3.0), 0);
        assert_eq!(FloatingLines::active_lines(f32::NAN), 0);
        assert_eq!(FloatingLines::active_lines(15.0), 15);
        assert_eq!(FloatingLines::active_lines(2.5), 3);
        assert_eq!(FloatingLines::active_lines(20.0), 20);
        assert_eq!(FloatingLines::active_lines(500.0), 20);
    }

    #[test]
    fn shader_loop_matches_cap() {
        assert!(FloatingLines::FRAGMENT_SHADER.contains("i < 20;"));
    }
}
