/// Shader build configuration: compiler resolution, compile list, caches

/// Environment variable overriding the SPIR-V compiler location
pub const GLSLANG_ENV: &str = "GLSLANG_VALIDATOR";

/// Compiler binary used when the environment does not override it
pub const GLSLANG_DEFAULT: &str = "glslangValidator";

/// Cache of per-source modification times from the last successful build
pub const SOURCE_CACHE_FILE: &str = "shader_times.json";

/// Cache of shared-include modification times; a change invalidates all
pub const INCLUDE_CACHE_FILE: &str = "include_times.json";

/// One source/output pair of the shader build
pub struct ShaderEntry {
    pub source: &'static str,
    pub output: &'static str,
}

/// Headers included by every shader; touching one forces a full rebuild
pub const SHARED_INCLUDES: &[&str] = &[
    "commonMath.h",
    "hostDeviceShared.h",
    "RtxFiltering_2/common.h",
    "RtxFiltering_2/hostDeviceShared.h",
    "RtxFiltering_3/hostDeviceShared.h",
];

/// All shaders of the project, relative to the shader root
pub const SHADER_COMPILE_LIST: &[ShaderEntry] = &[
    ShaderEntry {
        source: "GBuffer/gBuf.vert",
        output: "GBuffer/gBufVert.spv",
    },
    ShaderEntry {
        source: "GBuffer/gBuf.frag",
        output: "GBuffer/gBufFrag.spv",
    },
    ShaderEntry {
        source: "GBufferShow/gShow.vert",
        output: "GBufferShow/gShowVert.spv",
    },
    ShaderEntry {
        source: "GBufferShow/gShow.frag",
        output: "GBufferShow/gShowFrag.spv",
    },
    ShaderEntry {
        source: "GraphicsComputeGraphicsApp/edgeDetect.comp",
        output: "GraphicsComputeGraphicsApp/edgeDetectComp.spv",
    },
    ShaderEntry {
        source: "RTXApp/01_raygen.rgen",
        output: "RTXApp/01_raygen.spv",
    },
    ShaderEntry {
        source: "RTXApp/01_miss.rmiss",
        output: "RTXApp/01_miss.spv",
    },
    ShaderEntry {
        source: "RTXApp/01_close.rchit",
        output: "RTXApp/01_close.spv",
    },
];
