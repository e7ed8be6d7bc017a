/// Default identifier length.
pub const ID_LENGTH: usize = 16;

/// Source of fresh record identifiers.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random fixed-length tokens over nanoid's URL-safe alphabet.
#[derive(Debug, Clone, Copy)]
pub struct NanoIdGenerator {
    len: usize,
}

impl NanoIdGenerator {
    pub const fn new(len: usize) -> Self {
        Self { len }
    }
}

impl Default for NanoIdGenerator {
    fn default() -> Self {
        Self::new(ID_LENGTH)
    }
}

impl IdGenerator for NanoIdGenerator {
    fn generate(&self) -> String {
        nanoid::nanoid!((self.len))
    }
}
