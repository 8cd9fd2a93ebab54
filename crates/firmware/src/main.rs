//! cvpal is [Embassy](https://embassy.dev)-based firmware for a USB-MIDI to CV/Gate converter. The firmware runs on
//! the [Nucleo-F767ZI development board](https://www.st.com/en/evaluation-tools/nucleo-f767zi.html), which is
//! powered by an F7-series STM32 microcontroller.
//!
//! The device enumerates as a class-compliant USB-MIDI interface and drives four CV outputs (through two dual
//! 12-bit SPI DACs) and eight gate outputs (through a 74HC595 shift register). The MIDI channel of incoming messages
//! selects the conversion mode; see [`cvpal_lib`] for the table of modes.
//!
//! Two tasks share the [`MidiHandler`]: one feeds it USB-MIDI packets, the other ticks it at
//! [`TICK_HZ`](cvpal_lib::configuration::TICK_HZ) and renders it to the outputs. Rendering and ticking live in the same
//! task so that a pending change is always rendered before the tick that could clear a trigger pulse.

#![no_std]
#![no_main]

mod output;

use crate::output::{DualDac, OutputError, Outputs, ShiftRegister};
use cvpal_lib::{
    configuration::Config,
    midi_handler::{MidiHandler, Operation},
};
use defmt::{panic, *};
use embassy_executor::Spawner;
use embassy_futures::select::{Either, select};
use embassy_stm32::{
    bind_interrupts,
    gpio::{Level, Output, Speed},
    mode::Blocking,
    peripherals,
    spi::{self, Spi},
    time::Hertz,
    usb,
};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, mutex, signal::Signal};
use embassy_time::{Duration, Ticker};
use embassy_usb::{Builder, UsbDevice, class::midi::MidiClass, driver::EndpointError};
use static_cell::StaticCell;

use defmt_rtt as _;
#[cfg(not(feature = "panic-probe"))]
use panic_halt as _;
#[cfg(feature = "panic-probe")]
use panic_probe as _;

bind_interrupts!(
    #[doc(hidden)]
    struct Irqs {
        OTG_FS => usb::InterruptHandler<peripherals::USB_OTG_FS>;
    }
);

type HandlerAsyncMutex = mutex::Mutex<CriticalSectionRawMutex, MidiHandler>;
type UsbDriver = usb::Driver<'static, peripherals::USB_OTG_FS>;
type OutputStage = Outputs<Spi<'static, Blocking>, Output<'static>>;

/// Notifies the output task that the handler may need rendering.
static REFRESH: Signal<CriticalSectionRawMutex, ()> = Signal::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Initializing cvpal");

    let mut config = embassy_stm32::Config::default();
    {
        use embassy_stm32::rcc::*;
        // hse: high-speed external clock
        config.rcc.hse = Some(Hse {
            freq: Hertz(8_000_000),
            mode: HseMode::Bypass,
        });

        // pll: phase-locked loop, crucial for dividing clock
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL216,
            divp: Some(PllPDiv::DIV2), // 8mhz / 4 * 216 / 2 = 216Mhz
            // USB OTG FS runs from the 48MHz PLLQ clock rather than its bus clock
            divq: Some(PllQDiv::DIV9), // 8mhz / 4 * 216 / 9 = 48Mhz
            divr: None,
        });
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.mux.clk48sel = mux::Clk48sel::PLL1_Q;
    }
    let p = embassy_stm32::init(config);

    static HANDLER: StaticCell<HandlerAsyncMutex> = StaticCell::new();
    let handler = HANDLER.init(mutex::Mutex::new(MidiHandler::new(Config::default())));

    // Create the driver, from the HAL.
    static ENDPOINT_OUT_BUFFER: StaticCell<[u8; 256]> = StaticCell::new();
    let mut config = embassy_stm32::usb::Config::default();

    // the Nucleo board cannot be powered from CN13, so the device is self-powered and must detect VBUS
    config.vbus_detection = true;

    let driver = usb::Driver::new_fs(
        p.USB_OTG_FS,
        Irqs,
        p.PA12,
        p.PA11,
        ENDPOINT_OUT_BUFFER.init([0; 256]),
        config,
    );

    // per https://pid.codes, FOSS projects can apply to be listed under the vendor ID owned by InterBiometrics
    let vendor_id = 0x1209;
    let product_id = 0xC7A1;

    let mut config = embassy_usb::Config::new(vendor_id, product_id);
    config.manufacturer = Some("cvpal");
    config.product = Some("cvpal MIDI to CV/Gate");
    config.self_powered = true;
    config.max_power = 0;

    // Create embassy-usb DeviceBuilder using the driver and config.
    // It needs some buffers for building the descriptors.
    static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static CONTROL_BUFFER: StaticCell<[u8; 64]> = StaticCell::new();

    let mut builder = Builder::new(
        driver,
        config,
        CONFIG_DESCRIPTOR.init([0; 256]),
        BOS_DESCRIPTOR.init([0; 256]),
        &mut [], // no msos descriptors
        CONTROL_BUFFER.init([0; 64]),
    );

    // Create classes on the builder.
    let class = MidiClass::new(&mut builder, 0, 1, 64);

    // Build the builder.
    let usb = builder.build();

    // the DACs and the shift register share SPI1; each chip has its own select or latch line
    let mut spi_config = spi::Config::default();
    spi_config.frequency = Hertz(8_000_000);
    let bus = Spi::new_blocking_txonly(p.SPI1, p.PA5, p.PB5, spi_config);
    let outputs = Outputs::new(
        bus,
        DualDac::new(Output::new(p.PD14, Level::High, Speed::VeryHigh)),
        DualDac::new(Output::new(p.PD15, Level::High, Speed::VeryHigh)),
        ShiftRegister::new(Output::new(p.PF12, Level::Low, Speed::VeryHigh)),
    );

    unwrap!(spawner.spawn(usb_task(usb)));
    unwrap!(spawner.spawn(midi_task(class, handler)));
    unwrap!(spawner.spawn(output_task(outputs, handler)));
}

#[embassy_executor::task]
async fn usb_task(mut usb: UsbDevice<'static, UsbDriver>) -> ! {
    usb.run().await
}

#[embassy_executor::task]
async fn midi_task(
    mut class: MidiClass<'static, UsbDriver>,
    handler: &'static HandlerAsyncMutex,
) -> ! {
    loop {
        class.wait_connection().await;
        info!("USB connected");
        let _ = process_midi(&mut class, handler).await;
        info!("USB disconnected");
    }
}

/// Task responsible for ticking the handler and writing the rendered state to the DACs and the shift register.
///
/// MIDI wakes the task to render right away; on every tick, any pending change is rendered before the tick is applied.
/// The handler is only locked while rendering and ticking; the SPI transfers happen after it is released so that MIDI
/// processing never waits on the bus.
#[embassy_executor::task]
async fn output_task(mut outputs: OutputStage, handler: &'static HandlerAsyncMutex) -> ! {
    let tick_hz = handler.lock().await.config().tick_hz;
    let mut ticker = Ticker::every(Duration::from_hz(u64::from(tick_hz)));
    loop {
        let state = match select(REFRESH.wait(), ticker.next()).await {
            Either::First(()) => handler.lock().await.refresh().copied(),
            Either::Second(()) => handler.lock().await.tick_after_refresh(),
        };
        let Some(state) = state else {
            continue;
        };
        match outputs.write(&state) {
            Ok(()) => {}
            Err(OutputError::Spi(_)) => error!("SPI transfer to the outputs failed"),
            Err(OutputError::Pin(_)) => error!("Output select line could not be driven"),
        }
    }
}

#[doc(hidden)]
struct Disconnected {}

impl From<EndpointError> for Disconnected {
    fn from(val: EndpointError) -> Self {
        match val {
            EndpointError::BufferOverflow => panic!("Buffer overflow"),
            EndpointError::Disabled => Disconnected {},
        }
    }
}

/// Helper function which interprets data received over USB.
///
/// Hands every packet to the [`MidiHandler`] and wakes the output task.
async fn process_midi<'d, T: usb::Instance + 'd>(
    class: &mut MidiClass<'d, usb::Driver<'d, T>>,
    handler: &'static HandlerAsyncMutex,
) -> Result<(), Disconnected> {
    let mut buf = [0; 64];
    loop {
        let n = class.read_packet(&mut buf).await?;
        let operation = { handler.lock().await.parse(&buf[..n]) };
        if operation.contains(Operation::Reset) {
            info!("Mode changed to {}", handler.lock().await.mode());
        }
        trace!("Processed {} bytes: {}", n, operation);
        REFRESH.signal(());
    }
}
