// SPDX-License-Identifier: GPL-2.0-or-later

#[cfg(test)]
mod test;
mod writer;

pub use writer::SliceWriter;

use bytes::Bytes;
use thiserror::Error;

// Mpeg box type.
pub type BoxType = [u8; 4];

// Size of the `[size][type]` header that precedes every box.
pub const BOX_HEADER_SIZE: usize = 8;

// ImmutableBox is the common trait of boxes.
pub trait ImmutableBox {
    // Type returns the BoxType.
    fn box_type(&self) -> BoxType;

    // Size returns the marshaled size in bytes, excluding the header.
    // The size must be known before marshaling
    // since the box header contains the size.
    fn size(&self) -> usize;

    // Marshal box to writer.
    fn marshal(&self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error>;
}

#[derive(Debug, Error)]
pub enum Mp4Error {
    #[error("write: {0}")]
    Write(#[from] std::io::Error),

    #[error("from int: {0} {1}")]
    FromInt(String, std::num::TryFromIntError),

    #[error("descriptor length {0} does not fit in a single byte")]
    DescriptorLength(usize),
}

impl Mp4Error {
    // Reports whether a bounds-checked writer ran out of space.
    #[must_use]
    pub fn is_overflow(&self) -> bool {
        matches!(self, Mp4Error::Write(e) if e.kind() == std::io::ErrorKind::WriteZero)
    }
}

// Tree of boxes that can be marshaled together.
pub struct Boxes {
    pub mp4_box: Box<dyn ImmutableBox>,
    pub children: Vec<Boxes>,
}

impl Boxes {
    pub fn new<T: ImmutableBox + 'static>(mp4_box: T) -> Self {
        Self {
            mp4_box: Box::new(mp4_box),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_child(mut self, child: Boxes) -> Self {
        self.children.push(child);
        self
    }

    // Size returns the total size of the box including header and children.
    #[must_use]
    pub fn size(&self) -> usize {
        let mut total = self.mp4_box.size() + BOX_HEADER_SIZE;

        for child in &self.children {
            total += child.size();
        }

        total
    }

    // Marshal box including children.
    pub fn marshal(&self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error> {
        write_box_info(w, self.size(), self.mp4_box.box_type())?;
        self.mp4_box.marshal(w)?;

        for child in &self.children {
            child.marshal(w)?;
        }
        Ok(())
    }
}

pub fn write_box_info(
    w: &mut dyn std::io::Write,
    size: usize,
    typ: BoxType,
) -> Result<(), Mp4Error> {
    w.write_all(
        &u32::try_from(size)
            .map_err(|e| Mp4Error::FromInt("write box info".to_owned(), e))?
            .to_be_bytes(),
    )?;
    w.write_all(&typ)?;
    Ok(())
}

// Writes a box without children, returns the number of bytes written.
pub fn write_single_box(
    w: &mut dyn std::io::Write,
    b: &dyn ImmutableBox,
) -> Result<usize, Mp4Error> {
    let size = BOX_HEADER_SIZE + b.size();
    write_box_info(w, size, b.box_type())?;
    b.marshal(w)?;
    Ok(size)
}

/************************* FullBox **************************/

#[derive(Clone, Copy, Default)]
pub struct FullBox {
    pub version: u8,
    pub flags: [u8; 3],
}

impl FullBox {
    fn marshal_field(self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error> {
        w.write_all(&[self.version])?;
        w.write_all(&self.flags)?;
        Ok(())
    }
}

#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
pub fn u32_to_flags(v: u32) -> [u8; 3] {
    [(v >> 16) as u8, (v >> 8) as u8, v as u8]
}

/********************** MediaDuration ***********************/

// Creation time, modification time and duration of the movie, track
// and media headers. The narrow variant is serialized with version 0
// and 32 bit fields, the wide variant with version 1 and 64 bit fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaDuration {
    Narrow(u32),
    Wide(u64),
}

impl MediaDuration {
    // Picks the narrowest variant that can hold the value.
    #[must_use]
    pub fn new(v: u64) -> Self {
        u32::try_from(v).map_or(Self::Wide(v), Self::Narrow)
    }

    #[must_use]
    pub fn version(self) -> u8 {
        match self {
            Self::Narrow(_) => 0,
            Self::Wide(_) => 1,
        }
    }

    // Combined size of the creation time, modification time and duration.
    fn fields_size(self) -> usize {
        match self {
            Self::Narrow(_) => 12,
            Self::Wide(_) => 24,
        }
    }

    // Zero creation and modification times.
    fn marshal_times(self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error> {
        match self {
            Self::Narrow(_) => w.write_all(&[0; 8])?,
            Self::Wide(_) => w.write_all(&[0; 16])?,
        }
        Ok(())
    }

    fn marshal_duration(self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error> {
        match self {
            Self::Narrow(v) => w.write_all(&v.to_be_bytes())?,
            Self::Wide(v) => w.write_all(&v.to_be_bytes())?,
        }
        Ok(())
    }
}

/************************* Matrix ***************************/

// Transformation matrix, a b c d tx ty in 16.16 and u v w in 2.30.
#[must_use]
pub const fn matrix(a: i16, b: i16, c: i16, d: i16, tx: i16, ty: i16) -> [i32; 9] {
    [
        fixed_16_16(a),
        fixed_16_16(b),
        0,
        fixed_16_16(c),
        fixed_16_16(d),
        0,
        fixed_16_16(tx),
        fixed_16_16(ty),
        1 << 30,
    ]
}

#[allow(clippy::as_conversions)]
const fn fixed_16_16(v: i16) -> i32 {
    (v as i32) << 16
}

pub const UNITY_MATRIX: [i32; 9] = matrix(1, 0, 0, 1, 0, 0);

fn marshal_matrix(w: &mut dyn std::io::Write, m: &[i32; 9]) -> Result<(), Mp4Error> {
    for v in m {
        w.write_all(&v.to_be_bytes())?;
    }
    Ok(())
}

/*************************** ftyp ****************************/

pub const TYPE_FTYP: BoxType = *b"ftyp";

const FTYP_V1_BRANDS: &[[u8; 4]] = &[*b"isom", *b"avc1"];
const FTYP_V2_BRANDS: &[[u8; 4]] = &[*b"iso5", *b"dash", *b"msix"];

pub struct Ftyp {
    pub major_brand: [u8; 4],
    pub minor_version: u32,
    pub compatible_brands: &'static [[u8; 4]],
}

impl Ftyp {
    // File type for format versions below 2.
    #[must_use]
    pub fn v1() -> Self {
        Self {
            major_brand: *b"isom",
            minor_version: 1,
            compatible_brands: FTYP_V1_BRANDS,
        }
    }

    // File type for format version 2 and above.
    #[must_use]
    pub fn v2() -> Self {
        Self {
            major_brand: *b"iso5",
            minor_version: 1,
            compatible_brands: FTYP_V2_BRANDS,
        }
    }
}

impl ImmutableBox for Ftyp {
    fn box_type(&self) -> BoxType {
        TYPE_FTYP
    }

    fn size(&self) -> usize {
        8 + self.compatible_brands.len() * 4
    }

    fn marshal(&self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error> {
        w.write_all(&self.major_brand)?;
        w.write_all(&self.minor_version.to_be_bytes())?;
        for brand in self.compatible_brands {
            w.write_all(brand)?;
        }
        Ok(())
    }
}

/************************ containers *************************/

pub const TYPE_MOOV: BoxType = *b"moov";
pub const TYPE_MVEX: BoxType = *b"mvex";
pub const TYPE_TRAK: BoxType = *b"trak";
pub const TYPE_MDIA: BoxType = *b"mdia";
pub const TYPE_MINF: BoxType = *b"minf";
pub const TYPE_STBL: BoxType = *b"stbl";

/*************************** mvhd ****************************/

pub const TYPE_MVHD: BoxType = *b"mvhd";

pub struct Mvhd {
    pub timescale: u32,
    pub duration: MediaDuration,
    pub rate: i32,   // fixed-point 16.16 - template=0x00010000
    pub volume: i16, // template=0x0100
    pub matrix: [i32; 9],
    pub next_track_id: u32,
}

impl Mvhd {
    #[must_use]
    pub fn new(timescale: u32, duration: MediaDuration) -> Self {
        Self {
            timescale,
            duration,
            rate: 0x0001_0000,
            volume: 0x0100,
            matrix: UNITY_MATRIX,
            next_track_id: u32::MAX,
        }
    }
}

impl ImmutableBox for Mvhd {
    fn box_type(&self) -> BoxType {
        TYPE_MVHD
    }

    fn size(&self) -> usize {
        88 + self.duration.fields_size()
    }

    fn marshal(&self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error> {
        FullBox {
            version: self.duration.version(),
            flags: [0, 0, 0],
        }
        .marshal_field(w)?;
        self.duration.marshal_times(w)?;
        w.write_all(&self.timescale.to_be_bytes())?;
        self.duration.marshal_duration(w)?;
        w.write_all(&self.rate.to_be_bytes())?;
        w.write_all(&self.volume.to_be_bytes())?;
        w.write_all(&[0; 10])?; // Reserved.
        marshal_matrix(w, &self.matrix)?;
        w.write_all(&[0; 24])?; // Predefined.
        w.write_all(&self.next_track_id.to_be_bytes())?;
        Ok(())
    }
}

/*************************** tkhd ****************************/

pub const TYPE_TKHD: BoxType = *b"tkhd";

pub const TKHD_TRACK_ENABLED: u32 = 0x0000_0001;
pub const TKHD_TRACK_IN_MOVIE: u32 = 0x0000_0002;

pub struct Tkhd {
    pub flags: [u8; 3],
    pub track_id: u32,
    pub duration: MediaDuration,
    pub volume: i16, // template={if track_is_audio 0x0100 else 0}
    pub matrix: [i32; 9],
    pub width: u32,  // fixed-point 16.16
    pub height: u32, // fixed-point 16.16
}

impl ImmutableBox for Tkhd {
    fn box_type(&self) -> BoxType {
        TYPE_TKHD
    }

    fn size(&self) -> usize {
        72 + self.duration.fields_size()
    }

    fn marshal(&self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error> {
        FullBox {
            version: self.duration.version(),
            flags: self.flags,
        }
        .marshal_field(w)?;
        self.duration.marshal_times(w)?;
        w.write_all(&self.track_id.to_be_bytes())?;
        w.write_all(&[0; 4])?; // Reserved0.
        self.duration.marshal_duration(w)?;
        w.write_all(&[0; 8])?; // Reserved1.
        w.write_all(&[0; 4])?; // Layer and alternate group.
        w.write_all(&self.volume.to_be_bytes())?;
        w.write_all(&[0; 2])?; // Reserved2.
        marshal_matrix(w, &self.matrix)?;
        w.write_all(&self.width.to_be_bytes())?;
        w.write_all(&self.height.to_be_bytes())?;
        Ok(())
    }
}

/*************************** mdhd ****************************/

pub const TYPE_MDHD: BoxType = *b"mdhd";

pub struct Mdhd {
    pub timescale: u32,
    pub duration: MediaDuration,
    pub language: u16, // Packed ISO-639-2/T code, zero if undetermined.
}

impl ImmutableBox for Mdhd {
    fn box_type(&self) -> BoxType {
        TYPE_MDHD
    }

    fn size(&self) -> usize {
        12 + self.duration.fields_size()
    }

    fn marshal(&self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error> {
        FullBox {
            version: self.duration.version(),
            flags: [0, 0, 0],
        }
        .marshal_field(w)?;
        self.duration.marshal_times(w)?;
        w.write_all(&self.timescale.to_be_bytes())?;
        self.duration.marshal_duration(w)?;
        w.write_all(&self.language.to_be_bytes())?;
        w.write_all(&[0; 2])?; // Predefined.
        Ok(())
    }
}

/*************************** hdlr ****************************/

pub const TYPE_HDLR: BoxType = *b"hdlr";

pub struct Hdlr {
    pub handler_type: [u8; 4],
    pub name: &'static str,
}

impl Hdlr {
    #[must_use]
    pub fn video() -> Self {
        Self {
            handler_type: *b"vide",
            name: "VideoHandler",
        }
    }

    #[must_use]
    pub fn sound() -> Self {
        Self {
            handler_type: *b"soun",
            name: "SoundHandler",
        }
    }
}

impl ImmutableBox for Hdlr {
    fn box_type(&self) -> BoxType {
        TYPE_HDLR
    }

    fn size(&self) -> usize {
        25 + self.name.len()
    }

    fn marshal(&self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error> {
        FullBox::default().marshal_field(w)?;
        w.write_all(&[0; 4])?; // Predefined.
        w.write_all(&self.handler_type)?;
        w.write_all(&[0; 12])?; // Reserved.
        w.write_all(self.name.as_bytes())?;
        w.write_all(&[0])?;
        Ok(())
    }
}

/*************************** vmhd ****************************/

pub const TYPE_VMHD: BoxType = *b"vmhd";

#[derive(Default)]
pub struct Vmhd {
    pub graphics_mode: u16, // template=0
    pub opcolor: [u16; 3],  // template={0, 0, 0}
}

impl ImmutableBox for Vmhd {
    fn box_type(&self) -> BoxType {
        TYPE_VMHD
    }

    fn size(&self) -> usize {
        12
    }

    fn marshal(&self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error> {
        // Flags are always 1 for vmhd.
        FullBox {
            version: 0,
            flags: [0, 0, 1],
        }
        .marshal_field(w)?;
        w.write_all(&self.graphics_mode.to_be_bytes())?;
        for color in &self.opcolor {
            w.write_all(&color.to_be_bytes())?;
        }
        Ok(())
    }
}

/*************************** smhd ****************************/

pub const TYPE_SMHD: BoxType = *b"smhd";

#[derive(Default)]
pub struct Smhd {
    pub balance: i16, // fixed-point 8.8, template=0
}

impl ImmutableBox for Smhd {
    fn box_type(&self) -> BoxType {
        TYPE_SMHD
    }

    fn size(&self) -> usize {
        8
    }

    fn marshal(&self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error> {
        FullBox::default().marshal_field(w)?;
        w.write_all(&self.balance.to_be_bytes())?;
        w.write_all(&[0; 2])?; // Reserved.
        Ok(())
    }
}

/****************** dinf / dref / url ***********************/

pub const TYPE_DINF: BoxType = *b"dinf";
pub const TYPE_DREF: BoxType = *b"dref";
pub const TYPE_URL: BoxType = *b"url ";

pub const URL_SELF_CONTAINED: u32 = 0x0000_0001;

// Data information box with a single self contained data reference.
pub struct Dinf;

impl ImmutableBox for Dinf {
    fn box_type(&self) -> BoxType {
        TYPE_DINF
    }

    fn size(&self) -> usize {
        BOX_HEADER_SIZE + Dref.size()
    }

    fn marshal(&self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error> {
        write_single_box(w, &Dref)?;
        Ok(())
    }
}

// Data reference table with one url entry.
pub struct Dref;

impl ImmutableBox for Dref {
    fn box_type(&self) -> BoxType {
        TYPE_DREF
    }

    fn size(&self) -> usize {
        8 + BOX_HEADER_SIZE + Url.size()
    }

    fn marshal(&self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error> {
        FullBox::default().marshal_field(w)?;
        w.write_all(&1_u32.to_be_bytes())?; // Entry count.
        write_single_box(w, &Url)?;
        Ok(())
    }
}

// Data entry for media stored in the same file. The location
// is omitted because the self contained flag is set.
pub struct Url;

impl ImmutableBox for Url {
    fn box_type(&self) -> BoxType {
        TYPE_URL
    }

    fn size(&self) -> usize {
        4
    }

    fn marshal(&self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error> {
        FullBox {
            version: 0,
            flags: u32_to_flags(URL_SELF_CONTAINED),
        }
        .marshal_field(w)
    }
}

/******************* empty sample tables *********************/

pub const TYPE_STTS: BoxType = *b"stts";
pub const TYPE_STSC: BoxType = *b"stsc";
pub const TYPE_STSZ: BoxType = *b"stsz";
pub const TYPE_STCO: BoxType = *b"stco";

// Sample table without entries. Fragmented files carry
// their samples in the fragments instead.
pub struct EmptyTable(pub BoxType);

impl ImmutableBox for EmptyTable {
    fn box_type(&self) -> BoxType {
        self.0
    }

    fn size(&self) -> usize {
        // stsz has a uniform sample size before the count.
        if self.0 == TYPE_STSZ {
            12
        } else {
            8
        }
    }

    fn marshal(&self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error> {
        FullBox::default().marshal_field(w)?;
        if self.0 == TYPE_STSZ {
            w.write_all(&[0; 4])?; // Sample size.
        }
        w.write_all(&[0; 4])?; // Entry count.
        Ok(())
    }
}

// Empty stts, stsc, stsz and stco in the order they follow stsd.
#[must_use]
pub fn empty_sample_tables() -> [EmptyTable; 4] {
    [
        EmptyTable(TYPE_STTS),
        EmptyTable(TYPE_STSC),
        EmptyTable(TYPE_STSZ),
        EmptyTable(TYPE_STCO),
    ]
}

/*************************** stsd ****************************/

pub const TYPE_STSD: BoxType = *b"stsd";

pub struct Stsd {
    pub entry_count: u32,
}

impl ImmutableBox for Stsd {
    fn box_type(&self) -> BoxType {
        TYPE_STSD
    }

    fn size(&self) -> usize {
        8
    }

    fn marshal(&self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error> {
        FullBox::default().marshal_field(w)?;
        w.write_all(&self.entry_count.to_be_bytes())?;
        Ok(())
    }
}

/*********************** SampleEntry *************************/

pub const SAMPLE_ENTRY_SIZE: usize = 8;

pub struct SampleEntry {
    pub data_reference_index: u16,
}

impl Default for SampleEntry {
    fn default() -> Self {
        Self {
            data_reference_index: 1,
        }
    }
}

impl SampleEntry {
    fn marshal(&self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error> {
        w.write_all(&[0; 6])?; // Reserved.
        w.write_all(&self.data_reference_index.to_be_bytes())?;
        Ok(())
    }
}

/******************* VisualSampleEntry ***********************/

pub const TYPE_AVC1: BoxType = *b"avc1";
pub const TYPE_HVC1: BoxType = *b"hvc1";

pub const VISUAL_SAMPLE_ENTRY_SIZE: usize = SAMPLE_ENTRY_SIZE + 70;

// 72 DPI in 16.16.
pub const RESOLUTION_72_DPI: u32 = 0x0048_0000;

pub struct VisualSampleEntry {
    pub box_type: BoxType,
    pub sample_entry: SampleEntry,
    pub width: u16,
    pub height: u16,
    pub horiz_resolution: u32,
    pub vert_resolution: u32,
    pub frame_count: u16,
    pub compressor_name: [u8; 32],
    pub depth: u16,
    pub pre_defined3: i16,
}

impl VisualSampleEntry {
    #[must_use]
    pub fn new(box_type: BoxType, width: u16, height: u16) -> Self {
        Self {
            box_type,
            sample_entry: SampleEntry::default(),
            width,
            height,
            horiz_resolution: RESOLUTION_72_DPI,
            vert_resolution: RESOLUTION_72_DPI,
            frame_count: 1,
            compressor_name: [0; 32],
            depth: 0x18,
            pre_defined3: -1,
        }
    }
}

impl ImmutableBox for VisualSampleEntry {
    fn box_type(&self) -> BoxType {
        self.box_type
    }

    fn size(&self) -> usize {
        VISUAL_SAMPLE_ENTRY_SIZE
    }

    fn marshal(&self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error> {
        self.sample_entry.marshal(w)?;
        w.write_all(&[0; 2])?; // Predefined.
        w.write_all(&[0; 2])?; // Reserved.
        w.write_all(&[0; 12])?; // Predefined2.
        w.write_all(&self.width.to_be_bytes())?;
        w.write_all(&self.height.to_be_bytes())?;
        w.write_all(&self.horiz_resolution.to_be_bytes())?;
        w.write_all(&self.vert_resolution.to_be_bytes())?;
        w.write_all(&[0; 4])?; // Reserved2.
        w.write_all(&self.frame_count.to_be_bytes())?;
        w.write_all(&self.compressor_name)?;
        w.write_all(&self.depth.to_be_bytes())?;
        w.write_all(&self.pre_defined3.to_be_bytes())?;
        Ok(())
    }
}

/********************** CodecConfig **************************/

pub const TYPE_AVCC: BoxType = *b"avcC";
pub const TYPE_HVCC: BoxType = *b"hvcC";

// Decoder configuration record copied verbatim, e.g. avcC or hvcC.
pub struct CodecConfig {
    pub box_type: BoxType,
    pub data: Bytes,
}

impl ImmutableBox for CodecConfig {
    fn box_type(&self) -> BoxType {
        self.box_type
    }

    fn size(&self) -> usize {
        self.data.len()
    }

    fn marshal(&self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error> {
        w.write_all(&self.data)?;
        Ok(())
    }
}

/******************** AudioSampleEntry ***********************/

pub const TYPE_MP4A: BoxType = *b"mp4a";

pub const AUDIO_SAMPLE_ENTRY_SIZE: usize = SAMPLE_ENTRY_SIZE + 20;

pub struct AudioSampleEntry {
    pub box_type: BoxType,
    pub sample_entry: SampleEntry,
    pub channel_count: u16,
    pub sample_size: u16,
    pub sample_rate: u16, // Integer part of the 16.16 field.
}

impl ImmutableBox for AudioSampleEntry {
    fn box_type(&self) -> BoxType {
        self.box_type
    }

    fn size(&self) -> usize {
        AUDIO_SAMPLE_ENTRY_SIZE
    }

    fn marshal(&self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error> {
        self.sample_entry.marshal(w)?;
        w.write_all(&[0; 8])?; // Reserved.
        w.write_all(&self.channel_count.to_be_bytes())?;
        w.write_all(&self.sample_size.to_be_bytes())?;
        w.write_all(&[0; 2])?; // Predefined.
        w.write_all(&[0; 2])?; // Reserved2.
        w.write_all(&self.sample_rate.to_be_bytes())?;
        w.write_all(&[0; 2])?; // Fractional sample rate.
        Ok(())
    }
}

/*************************** esds ****************************/

pub const TYPE_ESDS: BoxType = *b"esds";

// 14496-1 descriptor tags.
pub const ES_DESCR_TAG: u8 = 0x03;
pub const DECODER_CONFIG_DESCR_TAG: u8 = 0x04;
pub const DECODER_SPECIFIC_DESCR_TAG: u8 = 0x05;
pub const SL_CONFIG_DESCR_TAG: u8 = 0x06;

pub const STREAM_TYPE_AUDIO: u8 = 0x15;

// Tag and single byte length.
const DESCR_HEADER_SIZE: usize = 2;
// ES_ID and flags.
const ES_DESCR_FIELDS_SIZE: usize = 3;
// Object type, stream type, buffer size and both bitrates.
const DECODER_CONFIG_FIELDS_SIZE: usize = 13;
// SL config descriptor with the predefined MP4 value.
const SL_CONFIG_DESCR_SIZE: usize = DESCR_HEADER_SIZE + 1;

// Largest decoder specific info that keeps every descriptor
// length within a single byte.
pub const ESDS_MAX_DECODER_SPECIFIC_INFO: usize = 0xff - esds_descriptor_overhead();

const fn esds_descriptor_overhead() -> usize {
    ES_DESCR_FIELDS_SIZE
        + DESCR_HEADER_SIZE
        + DECODER_CONFIG_FIELDS_SIZE
        + DESCR_HEADER_SIZE
        + SL_CONFIG_DESCR_SIZE
}

// Elementary stream descriptor chain for MPEG-4 audio.
pub struct Esds {
    pub es_id: u16,
    pub object_type_id: u8,
    pub buffer_size_db: u32, // 24 bits.
    pub max_bitrate: u32,
    pub avg_bitrate: u32,
    pub decoder_specific_info: Bytes,
}

impl Esds {
    // Payload size, excluding the box header, for a given decoder specific info length.
    #[must_use]
    pub const fn size_for(decoder_specific_info_len: usize) -> usize {
        4 + DESCR_HEADER_SIZE + esds_descriptor_overhead() + decoder_specific_info_len
    }

    fn es_descr_len(&self) -> Result<u8, Mp4Error> {
        descriptor_len(esds_descriptor_overhead() + self.decoder_specific_info.len())
    }

    fn decoder_config_descr_len(&self) -> Result<u8, Mp4Error> {
        descriptor_len(
            DECODER_CONFIG_FIELDS_SIZE + DESCR_HEADER_SIZE + self.decoder_specific_info.len(),
        )
    }

    // Returns an error if any descriptor length would not fit in a byte.
    pub fn validate(&self) -> Result<(), Mp4Error> {
        self.es_descr_len()?;
        Ok(())
    }
}

fn descriptor_len(len: usize) -> Result<u8, Mp4Error> {
    u8::try_from(len).map_err(|_| Mp4Error::DescriptorLength(len))
}

impl ImmutableBox for Esds {
    fn box_type(&self) -> BoxType {
        TYPE_ESDS
    }

    fn size(&self) -> usize {
        Self::size_for(self.decoder_specific_info.len())
    }

    fn marshal(&self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error> {
        let es_descr_len = self.es_descr_len()?;
        let decoder_config_descr_len = self.decoder_config_descr_len()?;
        let decoder_specific_len = descriptor_len(self.decoder_specific_info.len())?;

        FullBox::default().marshal_field(w)?;

        w.write_all(&[ES_DESCR_TAG, es_descr_len])?;
        w.write_all(&self.es_id.to_be_bytes())?;
        w.write_all(&[0])?; // Flags.

        w.write_all(&[DECODER_CONFIG_DESCR_TAG, decoder_config_descr_len])?;
        w.write_all(&[self.object_type_id, STREAM_TYPE_AUDIO])?;
        w.write_all(&self.buffer_size_db.to_be_bytes()[1..])?;
        w.write_all(&self.max_bitrate.to_be_bytes())?;
        w.write_all(&self.avg_bitrate.to_be_bytes())?;

        w.write_all(&[DECODER_SPECIFIC_DESCR_TAG, decoder_specific_len])?;
        w.write_all(&self.decoder_specific_info)?;

        // Predefined 2, reserved for use in MP4 files.
        w.write_all(&[SL_CONFIG_DESCR_TAG, 1, 2])?;
        Ok(())
    }
}

/*************************** trex ****************************/

pub const TYPE_TREX: BoxType = *b"trex";

#[derive(Default)]
pub struct Trex {
    pub track_id: u32,
    pub default_sample_description_index: u32,
    pub default_sample_duration: u32,
    pub default_sample_size: u32,
    pub default_sample_flags: u32,
}

impl ImmutableBox for Trex {
    fn box_type(&self) -> BoxType {
        TYPE_TREX
    }

    fn size(&self) -> usize {
        24
    }

    fn marshal(&self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error> {
        FullBox::default().marshal_field(w)?;
        w.write_all(&self.track_id.to_be_bytes())?;
        w.write_all(&self.default_sample_description_index.to_be_bytes())?;
        w.write_all(&self.default_sample_duration.to_be_bytes())?;
        w.write_all(&self.default_sample_size.to_be_bytes())?;
        w.write_all(&self.default_sample_flags.to_be_bytes())?;
        Ok(())
    }
}
