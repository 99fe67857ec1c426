use glam::Vec3;

use psounpack::data::prs;
use psounpack::data::qst::{QstVersion, detect_version, parse_qst};
use psounpack::diagnostics::{Diagnostics, Warning};
use psounpack::quest::dat::{DatNpc, DatObject, DatUnknown};
use psounpack::quest::script::{
    Episode, Instruction, InstructionArg, MAP_DESIGNATE, OPCODE_RET, ObjectCodeDecoder, SET_EPISODE,
};
use psounpack::quest::{Quest, parse_quest, write_quest_qst};

/// Decodes a toy encoding: `01` ret, `F8 e` set_episode(e), `F9 a v` map designate.
struct ToyDecoder;

impl ObjectCodeDecoder for ToyDecoder {
    fn decode(&self, object_code: &[u8]) -> Result<Vec<Instruction>, String> {
        let mut instructions = Vec::new();
        let mut i = 0;
        while i < object_code.len() {
            let arg = |k: usize| {
                object_code
                    .get(i + k)
                    .map(|&b| InstructionArg::Int(b as i64))
                    .ok_or_else(|| format!("truncated instruction at {i}"))
            };
            let instruction = match object_code[i] {
                0x01 => Instruction::new("ret", OPCODE_RET, 1, vec![]),
                0xF8 => Instruction::new(SET_EPISODE, 0xF8, 2, vec![arg(1)?]),
                0xF9 => Instruction::new(
                    MAP_DESIGNATE,
                    0xF9,
                    3,
                    vec![arg(1)?, InstructionArg::Int(0), arg(2)?],
                ),
                other => return Err(format!("unknown opcode {other:#04X}")),
            };
            i += instruction.size;
            instructions.push(instruction);
        }
        Ok(instructions)
    }
}

fn quest() -> Quest {
    let objects = (0..40)
        .map(|i| DatObject {
            type_id: 0x40 + (i % 3) as u16,
            section_id: i as u16,
            area_id: i % 4,
            position: Vec3::new(i as f32 * 1.5, 0.0, -(i as f32)),
            rotation: Vec3::new(0.0, 0.5, 0.0),
            unknown_1: [i as u8; 10],
            unknown_2: [0; 2],
            unknown_3: [0xAB; 28],
        })
        .collect();

    let npcs = (0..25)
        .map(|i| DatNpc {
            type_id: 0x60,
            section_id: 1,
            area_id: 2 + i % 2,
            position: Vec3::new(0.0, i as f32, 0.0),
            rotation: Vec3::ZERO,
            skin: i,
            unknown_1: [0; 10],
            unknown_2: [0; 6],
            unknown_3: [0; 20],
            unknown_4: [0; 4],
        })
        .collect();

    // function 0 at offset 1: ret, then set_episode(2), designate(3 -> 1), designate(1 -> 4), ret
    let object_code = vec![0x01, 0xF8, 0x02, 0xF9, 0x03, 0x01, 0xF9, 0x01, 0x04, 0x01];

    Quest::builder()
        .id(118)
        .language(1)
        .name("Lost HEAT SWORD")
        .short_description("Retrieve a weapon")
        .long_description("Retrieve a weapon from a Dragon.")
        .objects(objects)
        .npcs(npcs)
        .dat_unknowns(vec![DatUnknown {
            entity_type: 3,
            area_id: 0,
            data: vec![1, 2, 3, 4],
        }])
        .object_code(object_code)
        .function_offsets(vec![1, 0])
        .build()
}

fn sorted_by_area<T: Clone>(records: &[T], area: impl Fn(&T) -> u32) -> Vec<T> {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|record| area(record));
    sorted
}

#[test]
fn quest_survives_a_full_round_trip() {
    let written = quest();
    let bytes = write_quest_qst(&written, "quest118").unwrap();
    assert_eq!(detect_version(&bytes).unwrap(), QstVersion::BlueBurst);

    let loaded = parse_quest(&bytes, &ToyDecoder).unwrap();
    assert!(loaded.warnings.is_empty(), "{:?}", loaded.warnings);

    let quest = &loaded.quest;
    assert_eq!(quest.id, 118);
    assert_eq!(quest.language, 1);
    assert_eq!(quest.name, written.name);
    assert_eq!(quest.long_description, written.long_description);
    assert_eq!(quest.episode, Episode::IV);
    assert_eq!(
        quest.area_variants.iter().map(|(a, v)| (*a, *v)).collect::<Vec<_>>(),
        [(0, 0), (1, 4), (2, 0), (3, 1)]
    );
    assert_eq!(quest.dat_unknowns, written.dat_unknowns);
    assert_eq!(quest.function_offsets, [1, 0]);

    let expected_objects = sorted_by_area(&written.objects, |o| o.area_id);
    assert_eq!(quest.objects.len(), expected_objects.len());
    for (got, want) in quest.objects.iter().zip(&expected_objects) {
        assert_eq!(got.section_id, want.section_id);
        assert_eq!(got.position, want.position);
        assert_eq!(got.unknown_1, want.unknown_1);
        assert!((got.rotation - want.rotation).abs().max_element() < 1e-4);
    }
    let expected_npcs = sorted_by_area(&written.npcs, |n| n.area_id);
    assert_eq!(quest.npcs, expected_npcs);

    // Writing the parsed quest again reproduces the same container.
    assert_eq!(write_quest_qst(quest, "quest118").unwrap(), bytes);
}

#[test]
fn container_sub_files_are_prs_compressed() {
    let bytes = write_quest_qst(&quest(), "q").unwrap();
    let mut diag = Diagnostics::new();
    let qst = parse_qst(&bytes, &mut diag).unwrap();
    assert!(diag.is_empty());

    let dat = prs::decompress(&qst.file("q.dat").unwrap().data).unwrap();
    // 4 object areas, 2 NPC areas, 1 opaque block, terminator
    assert_eq!(dat.len(), 8 * 16 + 40 * 68 + 25 * 72 + 4);
}

#[test]
fn undecodable_script_is_absorbed() {
    let mut written = quest();
    written.object_code = vec![0x77];
    let bytes = write_quest_qst(&written, "q").unwrap();

    let loaded = parse_quest(&bytes, &ToyDecoder).unwrap();
    assert_eq!(loaded.quest.episode, Episode::I);
    assert!(loaded.quest.area_variants.values().all(|&variant| variant == 0));
    assert_eq!(
        loaded.warnings,
        [Warning::UndecodableScript {
            reason: "unknown opcode 0x77".to_string()
        }]
    );
}

#[test]
fn garbage_is_rejected() {
    assert!(parse_quest(&[0x58, 0x00, 0x44, 0x00], &ToyDecoder).is_err());
    assert!(parse_quest(&[0x44; 200], &ToyDecoder).is_err());
}
