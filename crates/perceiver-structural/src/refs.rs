use refpilot_core_types::ElementRef;

/// Sequential `e<N>` issuer; one allocator per catalog build.
#[derive(Debug, Default)]
pub struct RefAllocator {
    issued: u32,
}

impl RefAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_ref(&mut self) -> ElementRef {
        self.issued += 1;
        ElementRef::from_index(self.issued)
    }

    pub fn issued(&self) -> u32 {
        self.issued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_one_and_increments() {
        let mut alloc = RefAllocator::new();
        assert_eq!(alloc.next_ref().as_str(), "e1");
        assert_eq!(alloc.next_ref().as_str(), "e2");
        assert_eq!(alloc.issued(), 2);
        // a fresh allocator restarts the sequence
        assert_eq!(RefAllocator::new().next_ref().as_str(), "e1");
    }
}
