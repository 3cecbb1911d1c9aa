//! Kibo - Companion Robot Firmware
//!
//! Main firmware binary for RP2040-based robot boards. Runs the whole
//! robot from a single fixed-period control loop: UART bytes in,
//! protocol frames out, then one tick each for the state machine, gaze
//! servos, expression matrix, audio, and ranging.

#![no_std]
#![no_main]

mod hardware;

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::adc::{Adc, Channel as AdcChannel, Config as AdcConfig};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals::{PIO0, UART0};
use embassy_rp::pio::Pio;
use embassy_rp::pio_programs::ws2812::{PioWs2812, PioWs2812Program};
use embassy_rp::pwm::Pwm;
use embassy_rp::uart::{BufferedInterruptHandler, BufferedUartRx, BufferedUartTx, Config as UartConfig, Uart};
use embassy_time::{with_timeout, Duration, Instant, Ticker};
use embedded_io_async::{Read, Write};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use kibo_core::config::RobotConfig;
use kibo_drivers::controller::Robot;

use crate::hardware::{
    AdcLight, AdcMic, AdcParts, AdcShared, BatteryMonitor, HcSr04, MatrixBus, PwmSpeaker,
    ServoPwm, LED_COUNT,
};

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
    PIO0_IRQ_0 => embassy_rp::pio::InterruptHandler<PIO0>;
});

/// Control loop period: ~100 Hz
const TICK_INTERVAL_MS: u64 = 10;

/// Battery sampled every this many ticks (~5 s)
const BATTERY_SAMPLE_TICKS: u32 = 500;

/// UART receive window per tick; short enough to hold the loop cadence
/// with a silent host
const RX_WINDOW_MS: u64 = 2;

// UART ring buffers (must live forever)
static TX_BUF: StaticCell<[u8; 1024]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 1024]> = StaticCell::new();

// The shared ADC front end and the assembled robot
static ADC: StaticCell<AdcShared> = StaticCell::new();
static ROBOT: StaticCell<KiboRobot> = StaticCell::new();

// PIO program backing the WS2812 driver (must live forever)
static WS_PROGRAM: StaticCell<PioWs2812Program<'static, PIO0>> = StaticCell::new();

type KiboRobot = Robot<ServoPwm, ServoPwm, MatrixBus, AdcMic, PwmSpeaker, HcSr04, AdcLight>;

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Kibo firmware starting...");

    let p = embassy_rp::init(Default::default());

    // UART link to the host
    let uart_config = UartConfig::default(); // 115200 baud default
    let tx_buf = TX_BUF.init([0u8; 1024]);
    let rx_buf = RX_BUF.init([0u8; 1024]);
    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, uart_config);
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (tx, rx) = uart.split();

    // Gaze servos: one PWM slice each
    let servo_h = ServoPwm::new(Pwm::new_output_a(p.PWM_SLICE1, p.PIN_2, Default::default()));
    let servo_v = ServoPwm::new(Pwm::new_output_a(p.PWM_SLICE2, p.PIN_4, Default::default()));

    // Expression matrix: WS2812 chain on PIO0 + DMA
    let Pio {
        mut common, sm0, ..
    } = Pio::new(p.PIO0, Irqs);
    let program = WS_PROGRAM.init(PioWs2812Program::new(&mut common));
    let ws2812: PioWs2812<'_, PIO0, 0, LED_COUNT> =
        PioWs2812::new(&mut common, sm0, p.DMA_CH0, p.PIN_16, program);
    let matrix_bus = MatrixBus::new(ws2812);

    // Analog front end: microphone, light sensor, VSYS battery divider
    let adc = Adc::new_blocking(p.ADC, AdcConfig::default());
    let adc = ADC.init(AdcShared::new(AdcParts {
        adc,
        mic: AdcChannel::new_pin(p.PIN_26, Pull::None),
        light: AdcChannel::new_pin(p.PIN_27, Pull::None),
        vsys: AdcChannel::new_pin(p.PIN_29, Pull::None),
    }));

    // Speaker PWM-DAC
    let speaker = PwmSpeaker::new(Pwm::new_output_a(p.PWM_SLICE3, p.PIN_6, Default::default()));

    // Ultrasonic ranger
    let config = RobotConfig::default();
    let ranger = HcSr04::new(
        Output::new(p.PIN_14, Level::Low),
        Input::new(p.PIN_15, Pull::None),
        config.sensor.echo_timeout_us,
    );

    let robot = ROBOT.init(Robot::new(
        config,
        servo_h,
        servo_v,
        matrix_bus,
        AdcMic::new(adc),
        speaker,
        ranger,
        AdcLight::new(adc),
    ));
    let battery = BatteryMonitor::new(adc);

    info!("Peripherals initialized");

    spawner.spawn(robot_task(rx, tx, robot, battery)).unwrap();
}

/// The control loop: one tick every 10 ms, in the fixed component order
/// the `Robot` enforces internally.
#[embassy_executor::task]
async fn robot_task(
    mut rx: BufferedUartRx,
    mut tx: BufferedUartTx,
    robot: &'static mut KiboRobot,
    mut battery: BatteryMonitor,
) {
    info!("Robot task started");

    let mut ticker = Ticker::every(Duration::from_millis(TICK_INTERVAL_MS));
    let start = Instant::now();
    let mut rx_buf = [0u8; 512];
    let mut tick_count: u32 = 0;

    robot.set_battery_level(battery.percent());
    robot.start(0);

    loop {
        ticker.next().await;
        let now_ms = start.elapsed().as_millis() as u32;

        // Bounded read: a silent host must not stall the loop
        let received = match with_timeout(Duration::from_millis(RX_WINDOW_MS), rx.read(&mut rx_buf)).await
        {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                warn!("UART read error: {:?}", e);
                0
            }
            Err(_) => 0, // no traffic this tick
        };

        robot.tick(now_ms, &rx_buf[..received], |chunk| {
            if embassy_futures::block_on(tx.write_all(chunk)).is_err() {
                warn!("UART write failed");
            }
        });

        tick_count = tick_count.wrapping_add(1);
        if tick_count % BATTERY_SAMPLE_TICKS == 0 {
            robot.set_battery_level(battery.percent());
        }
    }
}
