use std::fmt::Write;

/// Renders `data` in canonical hex+ASCII form (`hexdump -C` style), sixteen bytes per line.
///
/// `offset` is added to the printed addresses, so a slice of a larger image keeps its
/// absolute positions.
pub fn hexdump(data: &[u8], offset: u64) -> String {
    let mut out = String::with_capacity(data.len() / 16 * 80 + 80);

    for (i, line) in data.chunks(16).enumerate() {
        let address = offset + (i as u64) * 16;
        let _ = write!(out, "{:08x}:", address);

        for b in line {
            let _ = write!(out, " {:02x}", b);
        }
        // align the ASCII column of a short last line
        for _ in line.len()..16 {
            out.push_str("   ");
        }

        out.push_str("  |");
        for &b in line {
            out.push(if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            });
        }
        out.push_str("|\n");
    }

    out
}
