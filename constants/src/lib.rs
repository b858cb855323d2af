/// Shared configuration for the renderer support tools
pub mod quadrature;
pub mod reservoir;
pub mod sample_buffer;
pub mod shaders;
