use crc::{CRC_32_CD_ROM_EDC, Crc};

const EDC: Crc<u32> = Crc::<u32>::new(&CRC_32_CD_ROM_EDC);

pub const ECC_P_OFFSET: usize = 0x81C;
pub const ECC_Q_OFFSET: usize = 0x8C8;
pub const ECC_P_SIZE: usize = 172;
pub const ECC_Q_SIZE: usize = 104;

struct EccTables {
    forward: [u8; 256],
    backward: [u8; 256],
}

const fn build_tables() -> EccTables {
    let mut forward = [0u8; 256];
    let mut backward = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let j = ((i << 1) ^ if i & 0x80 != 0 { 0x11D } else { 0 }) as u8;
        forward[i] = j;
        backward[i ^ j as usize] = i as u8;
        i += 1;
    }
    EccTables { forward, backward }
}

static TABLES: EccTables = build_tables();

pub fn edc(data: &[u8]) -> u32 {
    EDC.checksum(data)
}

// Reed-Solomon product code over the 0xC..0x81C (P) or 0xC..0x8C8 (Q) span of a raw sector.
fn compute_block(
    src: &[u8],
    major_count: usize,
    minor_count: usize,
    major_mult: usize,
    minor_inc: usize,
    dest: &mut [u8],
) {
    let size = major_count * minor_count;
    for major in 0..major_count {
        let mut index = (major >> 1) * major_mult + (major & 1);
        let mut ecc_a = 0u8;
        let mut ecc_b = 0u8;
        for _ in 0..minor_count {
            let temp = src[index];
            index += minor_inc;
            if index >= size {
                index -= size;
            }
            ecc_a ^= temp;
            ecc_b ^= temp;
            ecc_a = TABLES.forward[ecc_a as usize];
        }
        ecc_a = TABLES.backward[(TABLES.forward[ecc_a as usize] ^ ecc_b) as usize];
        dest[major] = ecc_a;
        dest[major + major_count] = ecc_a ^ ecc_b;
    }
}

/// Fills the ECC-P and ECC-Q fields of a 2352 byte sector.
///
/// Mode 2 form 1 sectors compute parity with a zeroed header, `zero_address` handles that.
pub fn write_ecc(sector: &mut [u8], zero_address: bool) {
    let mut header = [0u8; 4];
    if zero_address {
        header.copy_from_slice(&sector[12..16]);
        sector[12..16].fill(0);
    }

    let mut p = [0u8; ECC_P_SIZE];
    compute_block(&sector[0xC..ECC_P_OFFSET], 86, 24, 2, 86, &mut p);
    sector[ECC_P_OFFSET..ECC_P_OFFSET + ECC_P_SIZE].copy_from_slice(&p);

    let mut q = [0u8; ECC_Q_SIZE];
    compute_block(&sector[0xC..ECC_Q_OFFSET], 52, 43, 86, 88, &mut q);
    sector[ECC_Q_OFFSET..ECC_Q_OFFSET + ECC_Q_SIZE].copy_from_slice(&q);

    if zero_address {
        sector[12..16].copy_from_slice(&header);
    }
}

/// Recomputes the parity of `sector` and compares it with the stored fields.
pub fn check_ecc(sector: &[u8], zero_address: bool) -> bool {
    let mut copy = sector.to_vec();
    write_ecc(&mut copy, zero_address);
    copy[ECC_P_OFFSET..ECC_Q_OFFSET + ECC_Q_SIZE]
        == sector[ECC_P_OFFSET..ECC_Q_OFFSET + ECC_Q_SIZE]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edc_matches_catalog_check_value() {
        assert_eq!(edc(b"123456789"), 0x6EC2_EDC4);
    }

    #[test]
    fn tables_are_inverse() {
        for i in 0..256usize {
            let j = TABLES.forward[i];
            assert_eq!(TABLES.backward[i ^ j as usize] as usize, i);
        }
    }

    #[test]
    fn ecc_detects_corruption() {
        let mut sector = vec![0u8; 2352];
        for (i, b) in sector.iter_mut().enumerate().skip(16).take(2048) {
            *b = (i * 7) as u8;
        }
        write_ecc(&mut sector, false);
        assert!(check_ecc(&sector, false));

        sector[100] ^= 0xFF;
        assert!(!check_ecc(&sector, false));
    }

    #[test]
    fn zero_address_ignores_header() {
        let mut sector = vec![0u8; 2352];
        sector[12..16].copy_from_slice(&[0x00, 0x02, 0x00, 0x02]);
        write_ecc(&mut sector, true);
        sector[12..16].copy_from_slice(&[0x10, 0x20, 0x30, 0x02]);
        assert!(check_ecc(&sector, true));
    }
}
