//! # DS1077L Driver
//!
//! This is a driver for the Maxim DS1077L EconOscillator, a programmable
//! oscillator with two outputs.
//!
//! Specifically, this driver is for reading and setting the registers in the
//! DS1077L over I²C. It does not know or care what master clock grade your
//! part is.
//!
//! The DS1077L has three control registers:
//!
//! * BUS - the low three bits of the device address, and the EEPROM write
//!   control (WC) bit
//! * MUX - power-down and output-enable control, plus the prescalers on
//!   OUT0 and OUT1
//! * DIV - the programmable `N` divider on OUT1
//!
//! Each register has a typed representation ([`BusRegister`],
//! [`MuxRegister`], [`DivRegister`]) which can be decoded from, and encoded
//! to, the bytes that go over the wire. Values that the hardware cannot hold
//! are rejected when the typed value is built, so anything you can encode is
//! something the chip will accept.
//!
//! Two-byte registers are handled as a 16-bit word in the same way SMBus
//! "read word" does it: the first byte on the wire is the low half of the
//! word and the second byte is the high half.
//!
//! # Example
//!
//! You might set up OUT1 like this:
//!
//! ```rust
//! # use embedded_hal::blocking::i2c::{SevenBitAddress, Write, WriteRead};
//! # struct I2c;
//! # impl Write for I2c {
//! #     type Error = ();
//! #     fn write(&mut self, _address: SevenBitAddress, _bytes: &[u8]) -> Result<(), Self::Error> {
//! #         Ok(())
//! #     }
//! # }
//! # impl WriteRead for I2c {
//! #     type Error = ();
//! #     fn write_read(&mut self, _address: SevenBitAddress, _bytes: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error> {
//! #         buffer.fill(0);
//! #         Ok(())
//! #     }
//! # }
//! # let i2c = I2c;
//! let mut osc = ds1077l::Ds1077l::new(i2c, ds1077l::BusAddress::DEFAULT);
//! if let Err(e) = osc.update(|mux: &mut ds1077l::MuxRegister| {
//!     mux.prescaler1 = ds1077l::Prescaler::Div4;
//!     mux.div1 = false;
//! }) {
//!     // Oscillator didn't respond
//! }
//! let div = ds1077l::DivRegister::new(100).unwrap();
//! if let Err(e) = osc.write(&div) {
//!     // Oscillator didn't respond
//! }
//! if let Err(e) = osc.write_eeprom() {
//!     // Oscillator didn't respond
//! }
//! ```

#![no_std]
#![deny(unsafe_code)]
#![deny(missing_docs)]

use core::fmt;

use embedded_hal::blocking::i2c::{Write, WriteRead};

//
// Public Types
//

/// The DS1077L responds on one of eight I²C addresses, `0x58` to `0x5F`,
/// selected by the A2..A0 bits in the BUS register.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusAddress(u8);

/// The divisor applied by one of the two prescalers (`M0` on OUT0, `M1` on
/// OUT1).
///
/// Each prescaler is stored in the MUX register as a two bit code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Prescaler {
    /// Divide by 1 (code `0b00`). This is the power-on default.
    #[default]
    Div1 = 1,
    /// Divide by 2 (code `0b01`)
    Div2 = 2,
    /// Divide by 4 (code `0b10`)
    Div4 = 4,
    /// Divide by 8 (code `0b11`)
    Div8 = 8,
}

/// The commands understood by the DS1077L.
///
/// The first three select a register. [`Command::WriteEeprom`] carries no
/// data and copies the current register contents into EEPROM.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// The DIV register (two bytes)
    Div = 0x01,
    /// The MUX register (two bytes)
    Mux = 0x02,
    /// The BUS register (one byte)
    Bus = 0x0D,
    /// Write registers to EEPROM (no data)
    WriteEeprom = 0x3F,
}

/// The contents of the BUS register.
///
/// ```text
/// +----+----+----+----+----+----+----+----+
/// | -  | -  | -  | -  | WC | A2 | A1 | A0 |
/// +----+----+----+----+----+----+----+----+
/// ```
///
/// The top four bits are reserved and always written as zero.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusRegister {
    /// The device address the DS1077L will respond on.
    pub address: BusAddress,
    /// True if every register change is written to EEPROM straight away.
    ///
    /// The WC bit in the hardware is the other way up: a `0` means "write on
    /// every change" and a `1` means "only write on [`Command::WriteEeprom`]".
    pub write_control: bool,
}

/// The contents of the MUX register.
///
/// ```text
///        first data byte                   second data byte
/// +---+------+------+------+-----+-----+-----+-----+  +-----+------+---+ ... +---+
/// | - | PDN1 | PDN0 | SEL0 | EN0 | 0M1 | 0M0 | 1M1 |  | 1M0 | DIV1 | - | ... | - |
/// +---+------+------+------+-----+-----+-----+-----+  +-----+------+---+ ... +---+
/// ```
///
/// Note that the OUT1 prescaler code straddles the two bytes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MuxRegister {
    /// Power-down control bit 1
    pub pdn1: bool,
    /// Power-down control bit 0
    pub pdn0: bool,
    /// Selects whether the CTRL0 pin acts as power-down or output-enable
    pub sel0: bool,
    /// Enables the CTRL0 pin function
    pub en0: bool,
    /// Prescaler on OUT0
    pub prescaler0: Prescaler,
    /// Prescaler on OUT1
    pub prescaler1: Prescaler,
    /// When set, OUT1 bypasses the `N` divider
    pub div1: bool,
}

/// The contents of the DIV register: the programmable `N` divider on OUT1.
///
/// ```text
///        first data byte                  second data byte
/// +----+----+----+----+----+----+----+----+  +----+----+---+ ... +---+
/// | N9 | N8 | N7 | N6 | N5 | N4 | N3 | N2 |  | N1 | N0 | X | ... | X |
/// +----+----+----+----+----+----+----+----+  +----+----+---+ ... +---+
/// ```
///
/// The stored value is `N - 2`, so the divider runs from 2 to 1025.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DivRegister {
    n: u16,
}

/// Something in a register was given a value the DS1077L cannot hold.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ValueError {
    /// The `N` divider must be between 2 and 1025
    #[error("divider {0} is outside 2..=1025")]
    InvalidDivisor(u16),
    /// A prescaler must be 1, 2, 4 or 8
    #[error("prescaler {0} is not one of 1, 2, 4 or 8")]
    InvalidPrescaler(u8),
    /// The device address must be between 0x58 and 0x5F
    #[error("address {0:#04x} is outside 0x58..=0x5f")]
    InvalidAddress(u8),
}

/// The errors a [`Ds1077l`] operation can return.
#[derive(Debug, thiserror::Error)]
pub enum Error<E> {
    /// A value was rejected before anything was sent to the device
    #[error(transparent)]
    Value(#[from] ValueError),
    /// The I²C transfer failed
    #[error("I²C transfer failed: {0:?}")]
    Io(E),
}

/// A register that can be moved to and from the DS1077L.
pub trait Register: Sized + Copy + PartialEq {
    /// The command byte which selects this register.
    const COMMAND: Command;

    /// Build the register from the bytes read off the wire.
    ///
    /// Only the first [`Command::width`] bytes are looked at.
    fn from_wire(bytes: [u8; 2]) -> Self;

    /// Produce the bytes to put on the wire.
    ///
    /// Only the first [`Command::width`] bytes are sent.
    fn to_wire(&self) -> [u8; 2];
}

/// The before-and-after of a read-modify-write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Change<R> {
    /// What the register held when it was read
    pub previous: R,
    /// What the register holds now
    pub current: R,
}

/// Represents a DS1077L on an I²C bus.
///
/// Owns the bus handle for as long as you need to talk to the chip. Use
/// [`Ds1077l::release`] to get it back.
pub struct Ds1077l<I2C> {
    i2c: I2C,
    address: BusAddress,
}

//
// Public Data
//

/// The power-on contents of the BUS register
pub const BUS_DEFAULT: u8 = 0x00;

/// The power-on contents of the MUX register (SEL0 and EN0 set)
pub const MUX_DEFAULT: u16 = 0x0018;

/// The power-on contents of the DIV register (`N` = 2)
pub const DIV_DEFAULT: u16 = 0x0000;

//
// Private Data
//

const ADDRESS_MASK: u8 = 0b0000_0111;
const WC_BIT: u8 = 1 << 3;

const PDN1_BIT: u16 = 1 << 6;
const PDN0_BIT: u16 = 1 << 5;
const SEL0_BIT: u16 = 1 << 4;
const EN0_BIT: u16 = 1 << 3;
const M0_SHIFT: u16 = 1;
const M1_HIGH_BIT: u16 = 1 << 0;
const M1_LOW_BIT: u16 = 1 << 15;
const DIV1_BIT: u16 = 1 << 14;

const N_OFFSET: u16 = 2;

//
// impls on Public Types
//

impl BusAddress {
    /// The lowest address, used when A2..A0 are all zero. This is what the
    /// chip ships with.
    pub const DEFAULT: BusAddress = BusAddress(0x58);

    /// The highest address.
    pub const MAX: BusAddress = BusAddress(0x5F);

    /// Check that `address` is one a DS1077L can respond on.
    pub fn new(address: u8) -> Result<BusAddress, ValueError> {
        if (Self::DEFAULT.0..=Self::MAX.0).contains(&address) {
            Ok(BusAddress(address))
        } else {
            Err(ValueError::InvalidAddress(address))
        }
    }

    /// Build an address from the A2..A0 bits. Higher bits are ignored.
    pub fn from_offset(offset: u8) -> BusAddress {
        BusAddress(Self::DEFAULT.0 | (offset & ADDRESS_MASK))
    }

    /// The A2..A0 bits of this address.
    pub fn offset(self) -> u8 {
        self.0 & ADDRESS_MASK
    }
}

impl Default for BusAddress {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<BusAddress> for u8 {
    fn from(addr: BusAddress) -> u8 {
        addr.0
    }
}

impl TryFrom<u8> for BusAddress {
    type Error = ValueError;

    fn try_from(address: u8) -> Result<Self, Self::Error> {
        BusAddress::new(address)
    }
}

impl fmt::Display for BusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

impl Prescaler {
    /// Look up the prescaler for a two bit code. Bits above the bottom two
    /// are ignored, so this never fails.
    pub fn from_code(code: u8) -> Prescaler {
        match code & 0b11 {
            0b00 => Prescaler::Div1,
            0b01 => Prescaler::Div2,
            0b10 => Prescaler::Div4,
            _ => Prescaler::Div8,
        }
    }

    /// Look up the prescaler for a divisor of 1, 2, 4 or 8.
    pub fn from_divisor(divisor: u8) -> Result<Prescaler, ValueError> {
        match divisor {
            1 => Ok(Prescaler::Div1),
            2 => Ok(Prescaler::Div2),
            4 => Ok(Prescaler::Div4),
            8 => Ok(Prescaler::Div8),
            _ => Err(ValueError::InvalidPrescaler(divisor)),
        }
    }

    /// The two bit code stored in the MUX register.
    pub fn code(self) -> u8 {
        match self {
            Prescaler::Div1 => 0b00,
            Prescaler::Div2 => 0b01,
            Prescaler::Div4 => 0b10,
            Prescaler::Div8 => 0b11,
        }
    }

    /// The amount the clock is divided by.
    pub fn divisor(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Prescaler {
    type Error = ValueError;

    fn try_from(divisor: u8) -> Result<Self, Self::Error> {
        Prescaler::from_divisor(divisor)
    }
}

impl From<Prescaler> for u8 {
    fn from(prescaler: Prescaler) -> u8 {
        prescaler.divisor()
    }
}

impl fmt::Display for Prescaler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.divisor())
    }
}

impl Command {
    /// How many data bytes follow this command on the wire.
    pub fn width(self) -> usize {
        match self {
            Command::Div | Command::Mux => 2,
            Command::Bus => 1,
            Command::WriteEeprom => 0,
        }
    }
}

impl From<Command> for u8 {
    fn from(command: Command) -> u8 {
        command as u8
    }
}

impl BusRegister {
    /// Unpack the BUS register. The reserved bits are ignored.
    pub fn decode(byte: u8) -> BusRegister {
        BusRegister {
            address: BusAddress::from_offset(byte),
            write_control: byte & WC_BIT == 0,
        }
    }

    /// Pack the BUS register. The reserved bits are always zero.
    pub fn encode(&self) -> u8 {
        self.address.offset() | if self.write_control { 0 } else { WC_BIT }
    }
}

impl Default for BusRegister {
    fn default() -> Self {
        BusRegister::decode(BUS_DEFAULT)
    }
}

impl Register for BusRegister {
    const COMMAND: Command = Command::Bus;

    fn from_wire(bytes: [u8; 2]) -> Self {
        BusRegister::decode(bytes[0])
    }

    fn to_wire(&self) -> [u8; 2] {
        [self.encode(), 0]
    }
}

impl fmt::Display for BusRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let offset = self.address.offset();
        writeln!(f, "BUS:")?;
        writeln!(f, "  Address: {}", self.address)?;
        writeln!(f, "    A2: {}", (offset >> 2) & 1)?;
        writeln!(f, "    A1: {}", (offset >> 1) & 1)?;
        writeln!(f, "    A0: {}", offset & 1)?;
        writeln!(f, "  WC: {}", self.write_control)
    }
}

impl MuxRegister {
    /// Unpack the MUX register. Reserved bits are ignored.
    pub fn decode(word: u16) -> MuxRegister {
        // 1M1 is the bottom bit of the first byte, 1M0 the top bit of the second
        let m1 = ((word & M1_HIGH_BIT) << 1) | ((word & M1_LOW_BIT) >> 15);
        MuxRegister {
            pdn1: word & PDN1_BIT != 0,
            pdn0: word & PDN0_BIT != 0,
            sel0: word & SEL0_BIT != 0,
            en0: word & EN0_BIT != 0,
            prescaler0: Prescaler::from_code((word >> M0_SHIFT) as u8),
            prescaler1: Prescaler::from_code(m1 as u8),
            div1: word & DIV1_BIT != 0,
        }
    }

    /// Pack the MUX register. Reserved bits are always zero.
    pub fn encode(&self) -> u16 {
        let flag = |set: bool, bit: u16| if set { bit } else { 0 };
        let m1 = u16::from(self.prescaler1.code());
        flag(self.pdn1, PDN1_BIT)
            | flag(self.pdn0, PDN0_BIT)
            | flag(self.sel0, SEL0_BIT)
            | flag(self.en0, EN0_BIT)
            | u16::from(self.prescaler0.code()) << M0_SHIFT
            | (m1 >> 1)
            | (m1 & 1) << 15
            | flag(self.div1, DIV1_BIT)
    }
}

impl Default for MuxRegister {
    fn default() -> Self {
        MuxRegister::decode(MUX_DEFAULT)
    }
}

impl Register for MuxRegister {
    const COMMAND: Command = Command::Mux;

    fn from_wire(bytes: [u8; 2]) -> Self {
        MuxRegister::decode(u16::from_le_bytes(bytes))
    }

    fn to_wire(&self) -> [u8; 2] {
        self.encode().to_le_bytes()
    }
}

impl fmt::Display for MuxRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MUX:")?;
        writeln!(f, "  PDN1: {}", self.pdn1)?;
        writeln!(f, "  PDN0: {}", self.pdn0)?;
        writeln!(f, "  SEL0: {}", self.sel0)?;
        writeln!(f, "  EN0:  {}", self.en0)?;
        writeln!(f, "  M0:   {}", self.prescaler0)?;
        writeln!(f, "  M1:   {}", self.prescaler1)?;
        writeln!(f, "  DIV1: {}", self.div1)
    }
}

impl DivRegister {
    /// The smallest `N` the divider supports
    pub const MIN: u16 = 2;

    /// The largest `N` the divider supports
    pub const MAX: u16 = 1025;

    /// Create a DIV register value for a divider of `n`.
    pub fn new(n: u16) -> Result<DivRegister, ValueError> {
        if (Self::MIN..=Self::MAX).contains(&n) {
            Ok(DivRegister { n })
        } else {
            Err(ValueError::InvalidDivisor(n))
        }
    }

    /// Get the value of the `N` divider.
    pub fn divider(&self) -> u16 {
        self.n
    }

    /// Change the value of the `N` divider. On error the old value is kept.
    pub fn set_divider(&mut self, n: u16) -> Result<(), ValueError> {
        *self = DivRegister::new(n)?;
        Ok(())
    }

    /// Unpack the DIV register. The unused low bits of the second byte are
    /// ignored.
    pub fn decode(word: u16) -> DivRegister {
        let stored = (word & 0xFF) << 2 | (word >> 14) & 0b11;
        DivRegister {
            n: stored + N_OFFSET,
        }
    }

    /// Pack the DIV register. The unused low bits of the second byte are
    /// always zero.
    pub fn encode(&self) -> u16 {
        let stored = self.n - N_OFFSET;
        ((stored >> 2) & 0xFF) | (stored & 0b11) << 14
    }
}

impl Default for DivRegister {
    fn default() -> Self {
        DivRegister::decode(DIV_DEFAULT)
    }
}

impl TryFrom<u16> for DivRegister {
    type Error = ValueError;

    fn try_from(n: u16) -> Result<Self, Self::Error> {
        DivRegister::new(n)
    }
}

impl Register for DivRegister {
    const COMMAND: Command = Command::Div;

    fn from_wire(bytes: [u8; 2]) -> Self {
        DivRegister::decode(u16::from_le_bytes(bytes))
    }

    fn to_wire(&self) -> [u8; 2] {
        self.encode().to_le_bytes()
    }
}

impl fmt::Display for DivRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DIV:")?;
        writeln!(f, "  N: {}", self.n)
    }
}

impl<R: Register> Change<R> {
    /// Did the read-modify-write actually write anything?
    pub fn is_changed(&self) -> bool {
        self.previous != self.current
    }
}

impl<I2C, E> Ds1077l<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    /// Create a new DS1077L proxy object, talking to the chip at `address`
    /// on the given bus.
    pub fn new(i2c: I2C, address: BusAddress) -> Ds1077l<I2C> {
        Ds1077l { i2c, address }
    }

    /// The address we're talking to.
    pub fn address(&self) -> BusAddress {
        self.address
    }

    /// Give back the I²C bus.
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Read the raw bytes behind `command`.
    ///
    /// Only [`Command::width`] bytes are transferred; the rest of the array
    /// is zero. [`Command::WriteEeprom`] has nothing to read, so it doesn't
    /// touch the bus at all.
    pub fn read_register(&mut self, command: Command) -> Result<[u8; 2], Error<E>> {
        let mut buffer = [0u8; 2];
        let width = command.width();
        if width == 0 {
            return Ok(buffer);
        }
        self.i2c
            .write_read(self.address.into(), &[u8::from(command)], &mut buffer[..width])
            .map_err(Error::Io)?;
        #[cfg(feature = "defmt")]
        defmt::debug!(
            "Read DS1077L 0x{:02x}: {=[u8]:x}",
            command as u8,
            &buffer[..width]
        );
        Ok(buffer)
    }

    /// Write raw bytes to `command`.
    ///
    /// Only the first [`Command::width`] bytes of `data` are sent, so for
    /// [`Command::WriteEeprom`] this puts just the command byte on the bus.
    pub fn write_register(&mut self, command: Command, data: [u8; 2]) -> Result<(), Error<E>> {
        let width = command.width();
        let buffer = [u8::from(command), data[0], data[1]];
        #[cfg(feature = "defmt")]
        defmt::debug!(
            "Setting DS1077L 0x{:02x} to {=[u8]:x}",
            command as u8,
            &data[..width]
        );
        self.i2c
            .write(self.address.into(), &buffer[..=width])
            .map_err(Error::Io)
    }

    /// Read and decode one register.
    pub fn read<R: Register>(&mut self) -> Result<R, Error<E>> {
        let bytes = self.read_register(R::COMMAND)?;
        Ok(R::from_wire(bytes))
    }

    /// Encode and write one register.
    pub fn write<R: Register>(&mut self, register: &R) -> Result<(), Error<E>> {
        self.write_register(R::COMMAND, register.to_wire())
    }

    /// Read a register, let `f` change it, then write it back.
    ///
    /// Nothing is written if `f` leaves the register as it was. If `f` fails
    /// then nothing is written either, and its error is returned.
    pub fn try_update<R, F>(&mut self, f: F) -> Result<Change<R>, Error<E>>
    where
        R: Register,
        F: FnOnce(&mut R) -> Result<(), ValueError>,
    {
        let previous = self.read::<R>()?;
        let mut current = previous;
        f(&mut current)?;
        let change = Change { previous, current };
        if change.is_changed() {
            self.write(&current)?;
        }
        Ok(change)
    }

    /// Like [`Ds1077l::try_update`], for changes that can't fail.
    pub fn update<R, F>(&mut self, f: F) -> Result<Change<R>, Error<E>>
    where
        R: Register,
        F: FnOnce(&mut R),
    {
        self.try_update(|register| {
            f(register);
            Ok(())
        })
    }

    /// Copy the current register contents into EEPROM.
    ///
    /// Only needed when [`BusRegister::write_control`] is false.
    pub fn write_eeprom(&mut self) -> Result<(), Error<E>> {
        self.write_register(Command::WriteEeprom, [0, 0])
    }
}

//
// impls on Private Types
//

// None

//
// Tests
//

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::format;

    #[test]
    fn bus_decode_known_vectors() {
        // WC set means only write EEPROM on command
        assert_eq!(
            BusRegister::decode(0b0000_1010),
            BusRegister {
                address: BusAddress(0x5A),
                write_control: false,
            }
        );
        // WC clear means write on every change
        assert_eq!(
            BusRegister::decode(0b0000_0010),
            BusRegister {
                address: BusAddress(0x5A),
                write_control: true,
            }
        );
        assert_eq!(
            BusRegister::decode(0b0000_0011),
            BusRegister {
                address: BusAddress(0x5B),
                write_control: true,
            }
        );
        assert_eq!(
            BusRegister::decode(0b0000_1101),
            BusRegister {
                address: BusAddress(0x5D),
                write_control: false,
            }
        );
    }

    #[test]
    fn bus_decode_ignores_reserved_bits() {
        let bus = BusRegister::decode(0b1111_0010);
        assert_eq!(bus.address, BusAddress(0x5A));
        assert!(bus.write_control);
        assert_eq!(bus.encode(), 0b0000_0010);
    }

    #[test]
    fn bus_encode_known_vectors() {
        let mut bus = BusRegister {
            address: BusAddress::new(0x5A).unwrap(),
            write_control: false,
        };
        assert_eq!(bus.encode(), 0x0A);
        bus.address = BusAddress::new(0x5D).unwrap();
        assert_eq!(bus.encode(), 0x0D);
        bus.address = BusAddress::new(0x5B).unwrap();
        bus.write_control = true;
        assert_eq!(bus.encode(), 0x03);
    }

    #[test]
    fn bus_round_trip() {
        for address in 0x58..=0x5F {
            for write_control in [false, true] {
                let bus = BusRegister {
                    address: BusAddress::new(address).unwrap(),
                    write_control,
                };
                assert_eq!(BusRegister::decode(bus.encode()), bus);
            }
        }
    }

    #[test]
    fn bus_address_range() {
        assert_eq!(BusAddress::new(0x57), Err(ValueError::InvalidAddress(0x57)));
        assert_eq!(BusAddress::new(0x60), Err(ValueError::InvalidAddress(0x60)));
        assert_eq!(BusAddress::new(0x5F).map(u8::from), Ok(0x5F));
        assert_eq!(BusAddress::from_offset(0xFF), BusAddress::MAX);
        assert_eq!(BusAddress::default(), BusAddress::DEFAULT);
    }

    #[test]
    fn div_decode_known_vectors() {
        assert_eq!(DivRegister::decode(0x0000).divider(), 2);
        assert_eq!(DivRegister::decode(0x8000).divider(), 4);
        // The unused bits in the second byte don't matter
        assert_eq!(DivRegister::decode(0x9500).divider(), 4);
        assert_eq!(DivRegister::decode(0x8F00).divider(), 4);
        assert_eq!(DivRegister::decode(0xC000).divider(), 5);
        assert_eq!(DivRegister::decode(0xCC00).divider(), 5);
        assert_eq!(DivRegister::decode(0x4011).divider(), 0x45 + 2);
        assert_eq!(DivRegister::decode(0x7F11).divider(), 0x45 + 2);
        assert_eq!(DivRegister::decode(0xC0FF).divider(), 1025);
    }

    #[test]
    fn div_encode_known_vectors() {
        let cases = [(2, 0x0000), (4, 0x8000), (12, 0x8002), (196, 0x8030), (1025, 0xC0FF)];
        for (n, word) in cases {
            assert_eq!(DivRegister::new(n).unwrap().encode(), word, "n = {}", n);
        }
    }

    #[test]
    fn div_round_trip() {
        for n in DivRegister::MIN..=DivRegister::MAX {
            let div = DivRegister::new(n).unwrap();
            assert_eq!(DivRegister::decode(div.encode()), div);
            assert_eq!(div.encode() & 0x3F00, 0);
        }
    }

    #[test]
    fn div_rejects_out_of_range() {
        assert_eq!(DivRegister::new(1), Err(ValueError::InvalidDivisor(1)));
        assert_eq!(DivRegister::new(1026), Err(ValueError::InvalidDivisor(1026)));
        assert_eq!(DivRegister::try_from(0), Err(ValueError::InvalidDivisor(0)));

        let mut div = DivRegister::new(100).unwrap();
        assert_eq!(div.set_divider(1026), Err(ValueError::InvalidDivisor(1026)));
        assert_eq!(div.divider(), 100);
        div.set_divider(1025).unwrap();
        assert_eq!(div.divider(), 1025);
    }

    #[test]
    fn prescaler_table() {
        let table = [(0, 1), (1, 2), (2, 4), (3, 8)];
        for (code, divisor) in table {
            let prescaler = Prescaler::from_code(code);
            assert_eq!(prescaler.divisor(), divisor);
            assert_eq!(Prescaler::from_divisor(divisor), Ok(prescaler));
            assert_eq!(prescaler.code(), code);
        }
    }

    #[test]
    fn prescaler_rejects_other_divisors() {
        for divisor in [0, 3, 5, 6, 7, 9, 16, 255] {
            assert_eq!(
                Prescaler::try_from(divisor),
                Err(ValueError::InvalidPrescaler(divisor))
            );
        }
    }

    #[test]
    fn mux_decode_all_ones() {
        assert_eq!(
            MuxRegister::decode(0x7FFF),
            MuxRegister {
                pdn1: true,
                pdn0: true,
                sel0: true,
                en0: true,
                prescaler0: Prescaler::Div8,
                prescaler1: Prescaler::Div4,
                div1: true,
            }
        );
    }

    #[test]
    fn mux_prescaler1_straddles_bytes() {
        // 1M1 alone
        assert_eq!(MuxRegister::decode(0x0001).prescaler1, Prescaler::Div4);
        // 1M0 alone
        assert_eq!(MuxRegister::decode(0x8000).prescaler1, Prescaler::Div2);
        assert_eq!(MuxRegister::decode(0x8001).prescaler1, Prescaler::Div8);

        let mux = MuxRegister {
            prescaler1: Prescaler::Div2,
            ..MuxRegister::decode(0)
        };
        assert_eq!(mux.encode(), 0x8000);
        let mux = MuxRegister {
            prescaler1: Prescaler::Div4,
            ..mux
        };
        assert_eq!(mux.encode(), 0x0001);
    }

    #[test]
    fn mux_single_bits() {
        let mux = MuxRegister::decode(0);
        assert_eq!(MuxRegister { pdn1: true, ..mux }.encode(), 0x0040);
        assert_eq!(MuxRegister { pdn0: true, ..mux }.encode(), 0x0020);
        assert_eq!(MuxRegister { sel0: true, ..mux }.encode(), 0x0010);
        assert_eq!(MuxRegister { en0: true, ..mux }.encode(), 0x0008);
        assert_eq!(MuxRegister { div1: true, ..mux }.encode(), 0x4000);
        assert_eq!(
            MuxRegister {
                prescaler0: Prescaler::Div8,
                ..mux
            }
            .encode(),
            0x0006
        );
    }

    #[test]
    fn mux_round_trip() {
        let prescalers = [
            Prescaler::Div1,
            Prescaler::Div2,
            Prescaler::Div4,
            Prescaler::Div8,
        ];
        for bits in 0u8..32 {
            for prescaler0 in prescalers {
                for prescaler1 in prescalers {
                    let mux = MuxRegister {
                        pdn1: bits & 1 != 0,
                        pdn0: bits & 2 != 0,
                        sel0: bits & 4 != 0,
                        en0: bits & 8 != 0,
                        prescaler0,
                        prescaler1,
                        div1: bits & 16 != 0,
                    };
                    let word = mux.encode();
                    assert_eq!(MuxRegister::decode(word), mux);
                    assert_eq!(word & 0x3F80, 0, "reserved bits set in {:#06x}", word);
                }
            }
        }
    }

    #[test]
    fn mux_decode_ignores_reserved_bits() {
        let mux = MuxRegister::decode(0x3F80);
        assert_eq!(mux, MuxRegister::decode(0));
        assert_eq!(mux.encode(), 0);
    }

    #[test]
    fn power_on_defaults() {
        let bus = BusRegister::default();
        assert_eq!(bus.address, BusAddress::DEFAULT);
        assert!(bus.write_control);

        let mux = MuxRegister::default();
        assert!(mux.sel0 && mux.en0);
        assert!(!mux.pdn1 && !mux.pdn0 && !mux.div1);
        assert_eq!(mux.prescaler0, Prescaler::Div1);
        assert_eq!(mux.prescaler1, Prescaler::Div1);
        assert_eq!(mux.encode(), MUX_DEFAULT);

        assert_eq!(DivRegister::default().divider(), 2);
    }

    #[test]
    fn wire_bytes_follow_bus_order() {
        let div = DivRegister::new(1025).unwrap();
        assert_eq!(div.to_wire(), [0xFF, 0xC0]);
        assert_eq!(DivRegister::from_wire([0xFF, 0xC0]), div);

        let mux = MuxRegister::from_wire([0x7F, 0xFF]);
        assert_eq!(mux, MuxRegister::decode(0xFF7F));
        assert_eq!(BusRegister::from_wire([0x0A, 0xFF]).encode(), 0x0A);
    }

    #[test]
    fn pretty_print() {
        let bus = BusRegister::decode(0x0D);
        assert_eq!(
            format!("{}", bus),
            "BUS:\n  Address: 0x5d\n    A2: 1\n    A1: 0\n    A0: 1\n  WC: false\n"
        );
        assert_eq!(
            format!("{}", DivRegister::new(1025).unwrap()),
            "DIV:\n  N: 1025\n"
        );
        let text = format!("{}", MuxRegister::decode(0x7FFF));
        assert!(text.starts_with("MUX:\n"));
        assert!(text.contains("  M0:   8\n"));
        assert!(text.contains("  M1:   4\n"));
    }

    #[cfg(feature = "defmt")]
    #[test]
    fn value_types_implement_format() {
        fn is_format<T: defmt::Format>() {}
        is_format::<BusRegister>();
        is_format::<MuxRegister>();
        is_format::<DivRegister>();
        is_format::<Change<MuxRegister>>();
        is_format::<ValueError>();
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            format!("{}", ValueError::InvalidAddress(0x60)),
            "address 0x60 is outside 0x58..=0x5f"
        );
        let err: Error<()> = ValueError::InvalidPrescaler(3).into();
        assert_eq!(format!("{}", err), "prescaler 3 is not one of 1, 2, 4 or 8");
    }
}

//
// End of file
//
