// Module audio - Host audio clock, output device and gain nodes

pub mod device;
pub mod gain;
pub mod parameters;
pub mod timing;
