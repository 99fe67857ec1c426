/// Chunk streams making up vertex and polygon lists
pub mod chunks;
/// Ninja chunk model scene graphs
pub mod nj;
