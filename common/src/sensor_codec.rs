//! Raw-frame decoding for the AHT20 humidity sensor and the BMP280 barometer.

use crate::error::SensorError;

pub const AHT20_ADDR: u8 = 0x38;
pub const AHT20_INIT: [u8; 3] = [0xBE, 0x08, 0x00];
pub const AHT20_TRIGGER: [u8; 3] = [0xAC, 0x33, 0x00];
pub const AHT20_MEASURE_MS: u32 = 80;

pub const BMP280_ADDR: u8 = 0x76;
pub const BMP280_CHIP_ID: u8 = 0x58;
pub const BMP280_REG_ID: u8 = 0xD0;
pub const BMP280_REG_CALIB: u8 = 0x88;
pub const BMP280_REG_CTRL_MEAS: u8 = 0xF4;
pub const BMP280_REG_CONFIG: u8 = 0xF5;
pub const BMP280_REG_DATA: u8 = 0xF7;
/// Temperature x2, pressure x16, normal mode.
pub const BMP280_CTRL_MEAS: u8 = 0x57;
/// IIR filter x16, 0.5 ms standby.
pub const BMP280_CONFIG: u8 = 0x10;

const AHT20_STATUS_BUSY: u8 = 0x80;
const AHT20_FULL_SCALE: f32 = 1_048_576.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aht20Measurement {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

/// Sensirion-style CRC-8 (poly 0x31, init 0xFF), as used by the AHT20.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0xFF_u8;
    for byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Decodes a 6-byte measurement frame, or a 7-byte one whose last byte is the CRC.
pub fn decode_aht20(frame: &[u8]) -> Result<Aht20Measurement, SensorError> {
    if frame.len() < 6 {
        return Err(SensorError::Bus(format!(
            "aht20 frame too short: {} bytes",
            frame.len()
        )));
    }
    if frame[0] & AHT20_STATUS_BUSY != 0 {
        return Err(SensorError::NotReady);
    }
    if let Some(&expected) = frame.get(6) {
        let actual = crc8(&frame[..6]);
        if actual != expected {
            return Err(SensorError::Bus(format!(
                "aht20 crc mismatch: got {actual:#04x}, expected {expected:#04x}"
            )));
        }
    }

    let raw_humidity =
        (u32::from(frame[1]) << 12) | (u32::from(frame[2]) << 4) | (u32::from(frame[3]) >> 4);
    let raw_temperature =
        ((u32::from(frame[3]) & 0x0F) << 16) | (u32::from(frame[4]) << 8) | u32::from(frame[5]);

    Ok(Aht20Measurement {
        temperature_c: raw_temperature as f32 / AHT20_FULL_SCALE * 200.0 - 50.0,
        humidity_pct: raw_humidity as f32 / AHT20_FULL_SCALE * 100.0,
    })
}

/// Factory trimming values read from registers 0x88..=0x9F.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bmp280Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
}

impl Bmp280Calibration {
    pub fn from_bytes(raw: &[u8; 24]) -> Self {
        let u = |i: usize| u16::from_le_bytes([raw[i], raw[i + 1]]);
        let s = |i: usize| i16::from_le_bytes([raw[i], raw[i + 1]]);
        Self {
            t1: u(0),
            t2: s(2),
            t3: s(4),
            p1: u(6),
            p2: s(8),
            p3: s(10),
            p4: s(12),
            p5: s(14),
            p6: s(16),
            p7: s(18),
            p8: s(20),
            p9: s(22),
        }
    }

    /// Floating-point compensation from the datasheet. Returns (°C, Pa).
    pub fn compensate(&self, adc_t: i32, adc_p: i32) -> Result<(f32, f32), SensorError> {
        let adc_t = f64::from(adc_t);
        let adc_p = f64::from(adc_p);
        let t1 = f64::from(self.t1);

        let var1 = (adc_t / 16_384.0 - t1 / 1_024.0) * f64::from(self.t2);
        let delta = adc_t / 131_072.0 - t1 / 8_192.0;
        let var2 = delta * delta * f64::from(self.t3);
        let t_fine = var1 + var2;
        let temperature_c = t_fine / 5_120.0;

        let mut var1 = t_fine / 2.0 - 64_000.0;
        let mut var2 = var1 * var1 * f64::from(self.p6) / 32_768.0;
        var2 += var1 * f64::from(self.p5) * 2.0;
        var2 = var2 / 4.0 + f64::from(self.p4) * 65_536.0;
        var1 = (f64::from(self.p3) * var1 * var1 / 524_288.0 + f64::from(self.p2) * var1)
            / 524_288.0;
        var1 = (1.0 + var1 / 32_768.0) * f64::from(self.p1);
        if var1 == 0.0 {
            return Err(SensorError::Bus("bmp280 calibration yields zero divisor".into()));
        }

        let mut pressure = 1_048_576.0 - adc_p;
        pressure = (pressure - var2 / 4_096.0) * 6_250.0 / var1;
        let var1 = f64::from(self.p9) * pressure * pressure / 2_147_483_648.0;
        let var2 = pressure * f64::from(self.p8) / 32_768.0;
        pressure += (var1 + var2 + f64::from(self.p7)) / 16.0;

        Ok((temperature_c as f32, pressure as f32))
    }
}

/// Splits the 0xF7..=0xFC burst into (adc_t, adc_p).
pub fn bmp280_raw(data: &[u8; 6]) -> (i32, i32) {
    let adc_p = (i32::from(data[0]) << 12) | (i32::from(data[1]) << 4) | (i32::from(data[2]) >> 4);
    let adc_t = (i32::from(data[3]) << 12) | (i32::from(data[4]) << 4) | (i32::from(data[5]) >> 4);
    (adc_t, adc_p)
}
