//! Tile/sprite rasterizer.
//!
//! Reads the main board's VRAM, sprite tables, scroll registers, and both
//! palette banks every frame (nothing is cached across frames) and composes
//! a 256x224 RGB24 image from the 4bpp graphics ROM.
//!
//! Graphics layout: 8x8 tiles, 16 bytes per tile in each half of the ROM.
//! Row y uses bytes 2y and 2y+1; pixel x lives in byte x>>2 at bit x&3
//! (planes 0 and 2) and bit (x&3)+4 (planes 1 and 3). Planes 2-3 sit
//! 0x10000 bytes above planes 0-1.

use cathode_core::core::AddressSpace;

use super::main_board::{
    COLUMN_SCROLL, PALETTE_BANK1, PALETTE_WINDOW, SPRITE_ORDER, SPRITE_RAM, VRAM_BASE,
};

pub const SCREEN_WIDTH: u32 = 256;
pub const SCREEN_HEIGHT: u32 = 224;

/// First tile-plane line shown on screen.
const FIRST_VISIBLE_LINE: i32 = 16;

/// Distance between the plane 0/1 and plane 2/3 halves of the graphics ROM.
const PLANE_HALF: u32 = 0x1_0000;
const BYTES_PER_TILE: u32 = 16;

/// Back tile pass: pen 15 is the translucent pen and is left out.
pub const BACK_OPACITY: u16 = 0x7FFF;
/// Front tiles and sprites: pen 0 is transparent.
pub const FRONT_OPACITY: u16 = 0xFFFE;

const SPRITE_COUNT: u16 = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaletteBank {
    Tiles,
    Sprites,
}

/// Assemble the 4-bit colour index of pixel (x, y) of 8x8 tile `tile`.
pub fn tile_pixel(gfx: &AddressSpace, tile: u32, x: u32, y: u32) -> u8 {
    let addr = (tile * BYTES_PER_TILE + y * 2 + (x >> 2)) % PLANE_HALF;
    let lo = gfx.read_byte(addr);
    let hi = gfx.read_byte(addr + PLANE_HALF);
    let bit = x & 3;
    let p0 = (lo >> bit) & 1;
    let p1 = (lo >> (bit + 4)) & 1;
    let p2 = (hi >> bit) & 1;
    let p3 = (hi >> (bit + 4)) & 1;
    p0 | (p1 << 1) | (p2 << 2) | (p3 << 3)
}

/// RGB for palette entry `index` of `bank`, read from the main-board
/// address space. Cheat mode inverts every nibble's brightness.
pub fn palette_rgb(ram: &AddressSpace, bank: PaletteBank, index: u8, cheat: bool) -> [u8; 3] {
    let base = match bank {
        PaletteBank::Tiles => PALETTE_WINDOW,
        PaletteBank::Sprites => PALETTE_BANK1,
    } as u32;
    let lo = ram.read_byte(base + index as u32);
    let hi = ram.read_byte(base + 0x100 + index as u32);
    let expand = |nibble: u8| {
        let n = nibble & 0x0F;
        let n = if cheat { 15 - n } else { n };
        n * 0x11
    };
    [expand(lo), expand(lo >> 4), expand(hi)]
}

pub struct VideoRenderer {
    gfx: AddressSpace,
    frame: Vec<u8>,
}

impl VideoRenderer {
    pub fn new(gfx_rom: &[u8]) -> Self {
        let mut gfx = AddressSpace::new(AddressSpace::VIDEO_SIZE);
        gfx.load(0, gfx_rom);
        Self {
            gfx,
            frame: vec![0; (SCREEN_WIDTH * SCREEN_HEIGHT * 3) as usize],
        }
    }

    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    pub fn clear(&mut self) {
        self.frame.fill(0);
    }

    /// Compose one frame: clear, back tiles, front tiles, sprites.
    pub fn render(&mut self, ram: &AddressSpace, cheat: bool) {
        let backdrop = palette_rgb(ram, PaletteBank::Tiles, 0, cheat);
        for pixel in self.frame.chunks_exact_mut(3) {
            pixel.copy_from_slice(&backdrop);
        }

        self.draw_tiles(ram, cheat, false);
        self.draw_tiles(ram, cheat, true);
        self.draw_sprites(ram, cheat);
    }

    /// `front == false` draws every cell; `true` redraws only cells whose
    /// attribute carries the front-layer flag.
    fn draw_tiles(&mut self, ram: &AddressSpace, cheat: bool, front: bool) {
        let opacity = if front { FRONT_OPACITY } else { BACK_OPACITY };
        for col in 0..32u32 {
            let scroll = ram.read_byte(COLUMN_SCROLL as u32 + col) as i8 as i32;
            for row in 0..32u32 {
                let cell = VRAM_BASE as u32 + (row * 32 + col) * 2;
                let code = ram.read_byte(cell);
                let attr = ram.read_byte(cell + 1);
                if front && attr & 0x80 == 0 {
                    continue;
                }
                let tile = code as u32 | ((attr as u32 & 0x40) << 2);
                let color = attr & 0x0F;
                let flip_x = attr & 0x10 != 0;
                let flip_y = attr & 0x20 != 0;

                let y = ((row as i32 * 8 - scroll) & 0xFF) - FIRST_VISIBLE_LINE;
                let x = (col * 8) as i32;
                for py in 0..8 {
                    let src_y = if flip_y { 7 - py } else { py };
                    for px in 0..8 {
                        let src_x = if flip_x { 7 - px } else { px };
                        let pen = tile_pixel(&self.gfx, tile, src_x, src_y);
                        self.plot(
                            ram,
                            x + px as i32,
                            y + py as i32,
                            PaletteBank::Tiles,
                            color,
                            pen,
                            opacity,
                            cheat,
                        );
                    }
                }
            }
        }
    }

    /// Sprites in ordering-table order, last entry first, so the entry at
    /// the lowest address lands on top.
    fn draw_sprites(&mut self, ram: &AddressSpace, cheat: bool) {
        for slot in (0..SPRITE_COUNT).rev() {
            let index = ram.read_byte((SPRITE_ORDER + slot) as u32) & 0x1F;
            let entry = SPRITE_RAM as u32 + index as u32 * 4;
            let y = ram.read_byte(entry);
            let attr = ram.read_byte(entry + 1);
            let code = ram.read_byte(entry + 2) as u32 | ((attr as u32 & 0x30) << 4);
            let x = ram.read_byte(entry + 3) as i32;

            let color = attr & 0x0F;
            let flip_x = attr & 0x40 != 0;
            let flip_y = attr & 0x80 != 0;
            let sy = 240 - y as i32 - FIRST_VISIBLE_LINE;

            for py in 0..16u32 {
                let src_y = if flip_y { 15 - py } else { py };
                for px in 0..16u32 {
                    let src_x = if flip_x { 15 - px } else { px };
                    // Quadrants: 0 top-left, 1 bottom-left, 2 top-right, 3 bottom-right
                    let tile = code * 4 + (src_x / 8) * 2 + src_y / 8;
                    let pen = tile_pixel(&self.gfx, tile, src_x % 8, src_y % 8);
                    self.plot(
                        ram,
                        (x + px as i32) & 0xFF,
                        sy + py as i32,
                        PaletteBank::Sprites,
                        color,
                        pen,
                        FRONT_OPACITY,
                        cheat,
                    );
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn plot(
        &mut self,
        ram: &AddressSpace,
        x: i32,
        y: i32,
        bank: PaletteBank,
        color: u8,
        pen: u8,
        opacity: u16,
        cheat: bool,
    ) {
        if (1u16 << pen) & opacity == 0 {
            return;
        }
        if !(0..SCREEN_WIDTH as i32).contains(&x) || !(0..SCREEN_HEIGHT as i32).contains(&y) {
            return;
        }
        let rgb = palette_rgb(ram, bank, color * 16 + pen, cheat);
        let off = (y as usize * SCREEN_WIDTH as usize + x as usize) * 3;
        self.frame[off..off + 3].copy_from_slice(&rgb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gfx_with_solid_tile(tile: u32, pen: u8) -> Vec<u8> {
        let mut rom = vec![0u8; AddressSpace::VIDEO_SIZE];
        let lo_byte = (pen & 1) * 0x0F | ((pen >> 1) & 1) * 0xF0;
        let hi_byte = ((pen >> 2) & 1) * 0x0F | ((pen >> 3) & 1) * 0xF0;
        let base = (tile * BYTES_PER_TILE) as usize;
        for i in 0..16 {
            rom[base + i] = lo_byte;
            rom[base + 0x1_0000 + i] = hi_byte;
        }
        rom
    }

    #[test]
    fn pixel_assembles_four_planes() {
        let mut rom = vec![0u8; AddressSpace::VIDEO_SIZE];
        // Tile 1, row 2, pixel 5: byte 16 + 4 + 1, bit 1 / bit 5
        rom[16 + 5] = 0b0010_0000; // plane 1
        rom[0x1_0000 + 16 + 5] = 0b0000_0010; // plane 2
        let mut gfx = AddressSpace::new(AddressSpace::VIDEO_SIZE);
        gfx.load(0, &rom);
        assert_eq!(tile_pixel(&gfx, 1, 5, 2), 0b0110);
        assert_eq!(tile_pixel(&gfx, 1, 4, 2), 0);
    }

    #[test]
    fn solid_tile_helper_round_trips() {
        let mut gfx = AddressSpace::new(AddressSpace::VIDEO_SIZE);
        gfx.load(0, &gfx_with_solid_tile(3, 0b1011));
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(tile_pixel(&gfx, 3, x, y), 0b1011);
            }
        }
    }

    #[test]
    fn palette_nibbles_and_cheat_inversion() {
        let mut ram = AddressSpace::new(AddressSpace::CPU_SIZE);
        ram.write_byte(0xDD05, 0x3F); // G=3, R=15
        ram.write_byte(0xDE05, 0x08); // B=8
        assert_eq!(palette_rgb(&ram, PaletteBank::Tiles, 5, false), [255, 51, 136]);
        assert_eq!(palette_rgb(&ram, PaletteBank::Tiles, 5, true), [0, 204, 119]);

        ram.write_byte(0xFD05, 0x01);
        assert_eq!(palette_rgb(&ram, PaletteBank::Sprites, 5, false), [17, 0, 0]);
    }

    fn pixel(frame: &[u8], x: usize, y: usize) -> [u8; 3] {
        let off = (y * SCREEN_WIDTH as usize + x) * 3;
        [frame[off], frame[off + 1], frame[off + 2]]
    }

    #[test]
    fn empty_frame_is_backdrop() {
        let mut video = VideoRenderer::new(&[]);
        let mut ram = AddressSpace::new(AddressSpace::CPU_SIZE);
        ram.write_byte(PALETTE_WINDOW as u32, 0x21);
        video.render(&ram, false);
        assert_eq!(pixel(video.frame(), 0, 0), [0x11, 0x22, 0]);
        assert_eq!(pixel(video.frame(), 255, 223), [0x11, 0x22, 0]);
    }

    #[test]
    fn tile_lands_at_scrolled_position() {
        let mut video = VideoRenderer::new(&gfx_with_solid_tile(1, 2));
        let mut ram = AddressSpace::new(AddressSpace::CPU_SIZE);
        // Column 4, row 3: code 1, colour 1
        let cell = VRAM_BASE as u32 + (3 * 32 + 4) * 2;
        ram.write_byte(cell, 1);
        ram.write_byte(cell + 1, 0x01);
        ram.write_byte(PALETTE_WINDOW as u32 + 0x12, 0x0F); // red
        ram.write_byte(COLUMN_SCROLL as u32 + 4, 0xFC); // -4

        video.render(&ram, false);
        // Row 3 starts at plane line 24 + 4 = 28, screen line 12
        assert_eq!(pixel(video.frame(), 32, 12), [255, 0, 0]);
        assert_eq!(pixel(video.frame(), 39, 19), [255, 0, 0]);
        assert_eq!(pixel(video.frame(), 32, 11), [0, 0, 0]);
        assert_eq!(pixel(video.frame(), 40, 12), [0, 0, 0]);
    }

    #[test]
    fn back_pass_skips_pen_15() {
        let mut video = VideoRenderer::new(&gfx_with_solid_tile(0, 15));
        let mut ram = AddressSpace::new(AddressSpace::CPU_SIZE);
        ram.write_byte(PALETTE_WINDOW as u32 + 15, 0xFF);
        video.render(&ram, false);
        // Every cell is tile 0, pen 15: nothing drawn over the backdrop
        assert_eq!(pixel(video.frame(), 100, 100), [0, 0, 0]);

        // Flagged front cells draw pen 15
        let cell = VRAM_BASE as u32 + (10 * 32 + 10) * 2;
        ram.write_byte(cell + 1, 0x80);
        video.render(&ram, false);
        assert_eq!(pixel(video.frame(), 80, 64), [255, 255, 0]);
    }

    #[test]
    fn sprite_quadrants_and_priority() {
        // Sprite code 1 uses tiles 4 (TL), 5 (BL), 6 (TR), 7 (BR)
        let mut rom = vec![0u8; AddressSpace::VIDEO_SIZE];
        for (tile, pen) in [(4u32, 1u8), (5, 2), (6, 3), (7, 4)] {
            let solid = gfx_with_solid_tile(tile, pen);
            let base = (tile * BYTES_PER_TILE) as usize;
            rom[base..base + 16].copy_from_slice(&solid[base..base + 16]);
            rom[0x1_0000 + base..0x1_0000 + base + 16]
                .copy_from_slice(&solid[0x1_0000 + base..0x1_0000 + base + 16]);
        }
        let mut video = VideoRenderer::new(&rom);
        let mut ram = AddressSpace::new(AddressSpace::CPU_SIZE);
        for pen in 1..=4u8 {
            ram.write_byte(PALETTE_BANK1 as u32 + pen as u32, pen);
        }

        // Sprite 2 at (100, screen y 40); ordering table slot 0 -> sprite 2
        let entry = SPRITE_RAM as u32 + 2 * 4;
        ram.write_byte(entry, (240 - 16 - 40) as u8);
        ram.write_byte(entry + 2, 1);
        ram.write_byte(entry + 3, 100);
        ram.write_byte(SPRITE_ORDER as u32, 2);
        // Every other ordering slot points at sprite 0 (empty, pen 0)
        video.render(&ram, false);

        let red = |pen: u8| [pen * 0x11, 0, 0];
        assert_eq!(pixel(video.frame(), 100, 40), red(1));
        assert_eq!(pixel(video.frame(), 100, 48), red(2));
        assert_eq!(pixel(video.frame(), 108, 40), red(3));
        assert_eq!(pixel(video.frame(), 115, 55), red(4));

        // Flip X swaps left and right halves
        ram.write_byte(entry + 1, 0x40);
        video.render(&ram, false);
        assert_eq!(pixel(video.frame(), 100, 40), red(3));
        assert_eq!(pixel(video.frame(), 108, 48), red(2));
    }

    #[test]
    fn lowest_ordering_slot_is_drawn_on_top() {
        // Sprite code 1 is solid pen 1, code 2 solid pen 2
        let mut rom = vec![0u8; AddressSpace::VIDEO_SIZE];
        for (code, pen) in [(1u32, 1u8), (2, 2)] {
            for tile in code * 4..code * 4 + 4 {
                let solid = gfx_with_solid_tile(tile, pen);
                for plane in [0, 0x1_0000] {
                    let base = plane + (tile * BYTES_PER_TILE) as usize;
                    rom[base..base + 16].copy_from_slice(&solid[base..base + 16]);
                }
            }
        }
        let mut video = VideoRenderer::new(&rom);
        let mut ram = AddressSpace::new(AddressSpace::CPU_SIZE);
        ram.write_byte(PALETTE_BANK1 as u32 + 1, 0x0F); // red
        ram.write_byte(PALETTE_BANK1 as u32 + 2, 0xF0); // green

        // Sprite 3 at x 100, sprite 5 at x 108, same line
        for (index, code, x) in [(3u32, 1u8, 100u8), (5, 2, 108)] {
            let entry = SPRITE_RAM as u32 + index * 4;
            ram.write_byte(entry, (240 - 16 - 40) as u8);
            ram.write_byte(entry + 2, code);
            ram.write_byte(entry + 3, x);
        }
        ram.write_byte(SPRITE_ORDER as u32, 3);
        ram.write_byte(SPRITE_ORDER as u32 + 1, 5);
        video.render(&ram, false);

        assert_eq!(pixel(video.frame(), 104, 44), [255, 0, 0]);
        // Overlap: slot 0 wins
        assert_eq!(pixel(video.frame(), 110, 44), [255, 0, 0]);
        assert_eq!(pixel(video.frame(), 120, 44), [0, 255, 0]);

        // Swapping the slots swaps the winner
        ram.write_byte(SPRITE_ORDER as u32, 5);
        ram.write_byte(SPRITE_ORDER as u32 + 1, 3);
        video.render(&ram, false);
        assert_eq!(pixel(video.frame(), 110, 44), [0, 255, 0]);
        assert_eq!(pixel(video.frame(), 104, 44), [255, 0, 0]);
    }
}
