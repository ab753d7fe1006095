use crate::layers::Shape;
use crate::math::volume::{zeros_volume, Volume};

/// Position 0 of every network. Holds the current example; identity forward.
#[derive(Debug, Clone)]
pub struct InputLayer {
    pub shape: Shape,
    pub values: Volume,
}

impl InputLayer {
    pub fn new(shape: Shape) -> InputLayer {
        InputLayer { shape, values: zeros_volume(shape.channels, shape.map_size) }
    }

    pub fn forward(&mut self, input: Volume) {
        self.values = input;
    }
}
