use log::info;

pub struct MemoryMeter {
    enabled: bool,
}

impl MemoryMeter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn report(&mut self) {
        if !self.enabled {
            return;
        }
        info!("Memory reporting only supported on Linux");
    }
}
