/// Flat, power-of-two sized byte array backing one device's address space.
///
/// Every access is masked to the declared size, so out-of-range addresses
/// wrap instead of panicking. Used for the 64KB CPU buses and the 128KB
/// graphics bus; all reads/writes and firmware loads go through here.
pub struct AddressSpace {
    data: Box<[u8]>,
    mask: usize,
}

impl AddressSpace {
    /// 64KB space for an 8-bit CPU.
    pub const CPU_SIZE: usize = 0x1_0000;
    /// 128KB graphics space.
    pub const VIDEO_SIZE: usize = 0x2_0000;

    /// Create a zero-filled space. `size` must be a power of two.
    pub fn new(size: usize) -> Self {
        assert!(size.is_power_of_two(), "address space size must be a power of two");
        Self {
            data: vec![0; size].into_boxed_slice(),
            mask: size - 1,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn read_byte(&self, addr: u32) -> u8 {
        self.data[addr as usize & self.mask]
    }

    pub fn write_byte(&mut self, addr: u32, value: u8) {
        self.data[addr as usize & self.mask] = value;
    }

    /// Little-endian word read. The high byte address wraps within 16 bits,
    /// so a read at 0xFFFF takes its high byte from 0x0000.
    pub fn read_word(&self, addr: u16) -> u16 {
        let lo = self.read_byte(addr as u32);
        let hi = self.read_byte(addr.wrapping_add(1) as u32);
        u16::from_le_bytes([lo, hi])
    }

    pub fn write_word(&mut self, addr: u16, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.write_byte(addr as u32, lo);
        self.write_byte(addr.wrapping_add(1) as u32, hi);
    }

    /// Copy `src` into the space starting at `offset`, wrapping at the end.
    pub fn load(&mut self, offset: u32, src: &[u8]) {
        let start = offset as usize & self.mask;
        if start + src.len() <= self.data.len() {
            self.data[start..start + src.len()].copy_from_slice(src);
        } else {
            for (i, &byte) in src.iter().enumerate() {
                self.write_byte(offset.wrapping_add(i as u32), byte);
            }
        }
    }

    /// Borrow a contiguous window. Panics if the window crosses the end
    /// of the space; callers use fixed in-range hardware regions.
    pub fn slice(&self, offset: u32, len: usize) -> &[u8] {
        let start = offset as usize & self.mask;
        &self.data[start..start + len]
    }

    pub fn fill(&mut self, start: u32, len: usize, value: u8) {
        for i in 0..len {
            self.write_byte(start.wrapping_add(i as u32), value);
        }
    }
}
