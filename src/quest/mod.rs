//! Quests assembled from a `.qst` container.
//!
//! A container carries a PRS-compressed `.dat` entity table and a
//! PRS-compressed `.bin` script. [`parse_quest`] decodes both and combines
//! them with the facts scanned from the script into one [`Quest`].

/// Script file header codec
pub mod bin;
/// Entity table codec
pub mod dat;
/// Episode and area variant scanner
pub mod script;

use std::collections::BTreeMap;

use bon::Builder;
use rootcause::Report;
use thiserror::Error;
use tracing::debug;

use crate::data::prs::{self, PrsError};
use crate::data::qst::{Qst, QstError, QstFile, QstVersion, parse_qst, write_qst};
use crate::diagnostics::{Diagnostics, Warning};

use self::bin::{BinError, BinFile, parse_bin, write_bin};
use self::dat::{DatError, DatFile, DatNpc, DatObject, DatUnknown, parse_dat, write_dat};
use self::script::{Episode, ObjectCodeDecoder, scan_object_code};

#[derive(Debug, Error)]
pub enum QuestError {
    #[error("quest container has no {0} file")]
    MissingSubFile(&'static str),
    #[error("invalid quest container: {0}")]
    Container(#[from] QstError),
    #[error("could not decompress {file}: {source}")]
    Decompression {
        file: String,
        #[source]
        source: PrsError,
    },
    #[error("invalid entity table: {0}")]
    EntityTable(#[from] DatError),
    #[error("invalid script file: {0}")]
    Script(#[from] BinError),
}

/// Everything known about a quest.
#[derive(Builder, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Quest {
    pub id: u32,
    #[builder(default)]
    pub language: u32,
    #[builder(into)]
    pub name: String,
    #[builder(into, default)]
    pub short_description: String,
    #[builder(into, default)]
    pub long_description: String,
    #[builder(default)]
    pub episode: Episode,
    /// Area id to area variant id, ascending by area id.
    #[builder(default)]
    pub area_variants: BTreeMap<u32, u32>,
    #[builder(default)]
    pub objects: Vec<DatObject>,
    #[builder(default)]
    pub npcs: Vec<DatNpc>,
    /// Entity table blocks of unsupported types.
    #[builder(default)]
    pub dat_unknowns: Vec<DatUnknown>,
    #[builder(default)]
    #[cfg_attr(feature = "serde", serde(skip))]
    pub object_code: Vec<u8>,
    #[builder(default)]
    pub function_offsets: Vec<i32>,
    #[builder(default)]
    #[cfg_attr(feature = "serde", serde(skip))]
    pub shop_items: Vec<u8>,
}

/// A parsed quest and the anomalies encountered while decoding it.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LoadedQuest {
    pub quest: Quest,
    pub warnings: Vec<Warning>,
}

/// First file whose trimmed, lowercased name ends with `extension`.
fn find_sub_file<'a>(qst: &'a Qst, extension: &str, diag: &mut Diagnostics) -> Option<&'a QstFile> {
    let mut matching = qst
        .files
        .iter()
        .filter(|file| file.name.trim().to_lowercase().ends_with(extension));

    let found = matching.next()?;
    for ignored in matching {
        diag.warn(Warning::DuplicateSubFile {
            extension: extension.to_string(),
            ignored: ignored.name.clone(),
        });
    }
    Some(found)
}

fn decompress(file: &QstFile) -> Result<Vec<u8>, QuestError> {
    prs::decompress(&file.data).map_err(|source| QuestError::Decompression {
        file: file.name.clone(),
        source,
    })
}

fn load_quest(data: &[u8], decoder: &dyn ObjectCodeDecoder) -> Result<LoadedQuest, QuestError> {
    let mut diag = Diagnostics::new();
    let qst = parse_qst(data, &mut diag)?;

    let dat_file =
        find_sub_file(&qst, ".dat", &mut diag).ok_or(QuestError::MissingSubFile(".dat"))?;
    let bin_file =
        find_sub_file(&qst, ".bin", &mut diag).ok_or(QuestError::MissingSubFile(".bin"))?;
    debug!(dat = %dat_file.name, bin = %bin_file.name, "located quest sub-files");

    let dat = parse_dat(&decompress(dat_file)?, &dat_file.name, &mut diag)?;
    let bin = parse_bin(&decompress(bin_file)?, &bin_file.name, &mut diag)?;
    let facts = scan_object_code(decoder, &bin.object_code, &bin.function_offsets, &mut diag);

    let mut area_variants = facts.area_variants;
    let record_areas = dat
        .objs
        .iter()
        .map(|obj| obj.area_id)
        .chain(dat.npcs.iter().map(|npc| npc.area_id));
    for area_id in record_areas {
        area_variants.entry(area_id).or_insert(0);
    }

    let quest = Quest::builder()
        .id(bin.quest_id)
        .language(bin.language)
        .name(bin.name)
        .short_description(bin.short_description)
        .long_description(bin.long_description)
        .episode(facts.episode)
        .area_variants(area_variants)
        .objects(dat.objs)
        .npcs(dat.npcs)
        .dat_unknowns(dat.unknowns)
        .object_code(bin.object_code)
        .function_offsets(bin.function_offsets)
        .shop_items(bin.shop_items)
        .build();

    Ok(LoadedQuest {
        quest,
        warnings: diag.into_warnings(),
    })
}

/// Parse a `.qst` container into a quest.
///
/// Fails on structural problems only. Everything tolerable is returned as
/// warnings alongside the quest.
pub fn parse_quest(
    data: &[u8],
    decoder: &dyn ObjectCodeDecoder,
) -> Result<LoadedQuest, Report<QuestError>> {
    load_quest(data, decoder).map_err(Report::new)
}

fn build_qst(quest: &Quest, file_stem: &str) -> Result<Vec<u8>, QuestError> {
    let dat = write_dat(&DatFile {
        objs: quest.objects.clone(),
        npcs: quest.npcs.clone(),
        unknowns: quest.dat_unknowns.clone(),
    })?;
    let bin = write_bin(&BinFile {
        quest_id: quest.id,
        language: quest.language,
        name: quest.name.clone(),
        short_description: quest.short_description.clone(),
        long_description: quest.long_description.clone(),
        shop_items: quest.shop_items.clone(),
        object_code: quest.object_code.clone(),
        function_offsets: quest.function_offsets.clone(),
    })?;

    let quest_no = u16::try_from(quest.id).unwrap_or(0);
    let files = [("dat", dat), ("bin", bin)]
        .into_iter()
        .map(|(extension, data)| {
            let mut file = QstFile::new(format!("{file_stem}.{extension}"), prs::compress(&data));
            file.quest_no = Some(quest_no);
            file
        })
        .collect();

    Ok(write_qst(&Qst {
        version: QstVersion::BlueBurst,
        files,
    })?)
}

/// Write `quest` as a Blue Burst container holding `<file_stem>.dat` and
/// `<file_stem>.bin`.
pub fn write_quest_qst(quest: &Quest, file_stem: &str) -> Result<Vec<u8>, Report<QuestError>> {
    build_qst(quest, file_stem).map_err(Report::new)
}
