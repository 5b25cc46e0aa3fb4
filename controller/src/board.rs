use std::{cell::RefCell, rc::Rc, thread, time::Duration};

use anyhow::{anyhow, Context};
use esp_idf_hal::{
    delay::BLOCK,
    gpio::{AnyInputPin, AnyOutputPin, Input, Output, PinDriver},
    i2c::I2cDriver,
    sys::EspError,
};
use log::{info, warn};

use mochi_common::{
    sensor_codec::{
        bmp280_raw, decode_aht20, Bmp280Calibration, AHT20_ADDR, AHT20_INIT, AHT20_MEASURE_MS,
        AHT20_TRIGGER, BMP280_ADDR, BMP280_CHIP_ID, BMP280_CONFIG, BMP280_CTRL_MEAS,
        BMP280_REG_CALIB, BMP280_REG_CONFIG, BMP280_REG_CTRL_MEAS, BMP280_REG_DATA,
        BMP280_REG_ID,
    },
    Buzzer, Display, EnvironmentSensor, Frame, Framebuffer, Reading, SensorError, TouchInput,
};

/// The control loop is the only bus user, so a plain `RefCell` is enough.
pub type SharedBus = Rc<RefCell<I2cDriver<'static>>>;

const OLED_ADDR: u8 = 0x3C;
const OLED_CONTROL_CMD: u8 = 0x00;
const OLED_CONTROL_DATA: u8 = 0x40;
const OLED_CHUNK: usize = 32;
const OLED_DISPLAY_OFF: u8 = 0xAE;
const OLED_DISPLAY_ON: u8 = 0xAF;
// 128x64, internal charge pump, horizontal addressing, rotated 180.
const OLED_INIT: [u8; 25] = [
    0xAE, 0xD5, 0x80, 0xA8, 0x3F, 0xD3, 0x00, 0x40, 0x8D, 0x14, 0x20, 0x00, 0xA1, 0xC8, 0xDA,
    0x12, 0x81, 0xCF, 0xD9, 0xF1, 0xDB, 0x40, 0xA4, 0xA6, 0xAF,
];

fn bus_error(err: EspError) -> SensorError {
    SensorError::Bus(err.to_string())
}

/// AHT20 for temperature and humidity, BMP280 for pressure.
pub struct ClimateSensors {
    bus: SharedBus,
    calibration: Bmp280Calibration,
}

impl ClimateSensors {
    pub fn new(bus: SharedBus) -> anyhow::Result<Self> {
        let mut i2c = bus.borrow_mut();

        i2c.write(AHT20_ADDR, &AHT20_INIT, BLOCK)
            .context("AHT20 not responding")?;
        thread::sleep(Duration::from_millis(10));

        let mut chip_id = [0_u8; 1];
        i2c.write_read(BMP280_ADDR, &[BMP280_REG_ID], &mut chip_id, BLOCK)
            .context("BMP280 not responding")?;
        if chip_id[0] != BMP280_CHIP_ID {
            return Err(anyhow!("unexpected BMP280 chip id {:#04x}", chip_id[0]));
        }

        let mut raw = [0_u8; 24];
        i2c.write_read(BMP280_ADDR, &[BMP280_REG_CALIB], &mut raw, BLOCK)
            .context("failed to read BMP280 calibration")?;
        i2c.write(BMP280_ADDR, &[BMP280_REG_CONFIG, BMP280_CONFIG], BLOCK)?;
        i2c.write(BMP280_ADDR, &[BMP280_REG_CTRL_MEAS, BMP280_CTRL_MEAS], BLOCK)?;
        drop(i2c);

        info!("AHT20 and BMP280 initialised");
        Ok(Self {
            bus,
            calibration: Bmp280Calibration::from_bytes(&raw),
        })
    }
}

impl EnvironmentSensor for ClimateSensors {
    fn read_environment(&mut self) -> Result<Reading, SensorError> {
        let mut i2c = self.bus.borrow_mut();

        i2c.write(AHT20_ADDR, &AHT20_TRIGGER, BLOCK)
            .map_err(bus_error)?;
        thread::sleep(Duration::from_millis(u64::from(AHT20_MEASURE_MS)));
        let mut frame = [0_u8; 7];
        i2c.read(AHT20_ADDR, &mut frame, BLOCK).map_err(bus_error)?;
        let climate = decode_aht20(&frame)?;

        let mut data = [0_u8; 6];
        i2c.write_read(BMP280_ADDR, &[BMP280_REG_DATA], &mut data, BLOCK)
            .map_err(bus_error)?;
        let (adc_t, adc_p) = bmp280_raw(&data);
        let (_, pressure_pa) = self.calibration.compensate(adc_t, adc_p)?;

        Ok(Reading {
            temperature_c: climate.temperature_c,
            humidity_pct: climate.humidity_pct,
            pressure_hpa: pressure_pa / 100.0,
        })
    }
}

pub struct OledPanel {
    bus: SharedBus,
    framebuffer: Framebuffer,
}

impl OledPanel {
    pub fn new(bus: SharedBus) -> anyhow::Result<Self> {
        let panel = Self {
            bus,
            framebuffer: Framebuffer::new(),
        };
        panel.command(&OLED_INIT).context("SSD1306 init failed")?;
        panel.flush().context("SSD1306 clear failed")?;
        Ok(panel)
    }

    fn command(&self, commands: &[u8]) -> Result<(), EspError> {
        let mut packet = Vec::with_capacity(commands.len() + 1);
        packet.push(OLED_CONTROL_CMD);
        packet.extend_from_slice(commands);
        self.bus.borrow_mut().write(OLED_ADDR, &packet, BLOCK)
    }

    fn flush(&self) -> Result<(), EspError> {
        // Full-window column and page range.
        self.command(&[0x21, 0, 127, 0x22, 0, 7])?;

        let mut i2c = self.bus.borrow_mut();
        let mut packet = [0_u8; OLED_CHUNK + 1];
        packet[0] = OLED_CONTROL_DATA;
        for chunk in self.framebuffer.as_bytes().chunks(OLED_CHUNK) {
            packet[1..=chunk.len()].copy_from_slice(chunk);
            i2c.write(OLED_ADDR, &packet[..=chunk.len()], BLOCK)?;
        }
        Ok(())
    }
}

impl Display for OledPanel {
    fn render(&mut self, frame: &Frame) {
        self.framebuffer.draw_frame(frame);
        if let Err(err) = self.flush() {
            warn!("display flush failed: {err}");
        }
    }

    fn set_power(&mut self, on: bool) {
        let command = if on { OLED_DISPLAY_ON } else { OLED_DISPLAY_OFF };
        if let Err(err) = self.command(&[command]) {
            warn!("display power command failed: {err}");
        }
    }
}

/// Capacitive touch module with a digital output, high while touched.
pub struct GpioTouch(pub PinDriver<'static, AnyInputPin, Input>);

impl TouchInput for GpioTouch {
    fn is_touch_active(&mut self) -> bool {
        self.0.is_high()
    }
}

/// Active buzzer: sounds while the pin is high.
pub struct GpioBuzzer(pub PinDriver<'static, AnyOutputPin, Output>);

impl Buzzer for GpioBuzzer {
    fn pulse(&mut self, duration_ms: u32) {
        if let Err(err) = self.0.set_high() {
            warn!("buzzer on failed: {err}");
            return;
        }
        thread::sleep(Duration::from_millis(u64::from(duration_ms)));
        if let Err(err) = self.0.set_low() {
            warn!("buzzer off failed: {err}");
        }
    }
}
