pub mod attention;
pub mod channels;
pub mod detection;
pub mod frame;
