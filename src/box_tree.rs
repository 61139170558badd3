//! メモリ上のバイト列に含まれるボックスの木構造を走査するためのモジュール
use crate::{BoxHeader, BoxRange, BoxType, Decode};

/// コンテナボックスを再帰的に辿る際の最大の深さ
///
/// 正常な `moov` 配下のコンテナの入れ子は 5 段程度なので、それを大きく超える入れ子は破損データとして扱う
const MAX_DEPTH: usize = 16;

/// `buf` 内に含まれる `box_type` 種別のボックスを全て探して、深さ優先・前順で返す
///
/// 既知のコンテナ種別（`moov`, `trak`, `mdia`, `minf`, `stbl`）のボックスについては、
/// そのペイロード内も再帰的に探索する。
/// 返り値の各要素のオフセットは `buf` の先頭を起点としたもの。
///
/// ヘッダーサイズより小さいサイズを持つボックスに到達した場合には、
/// エラーとはせずに、その階層の走査をそこで終了する。
pub fn find_boxes(buf: &[u8], box_type: BoxType) -> Vec<BoxRange> {
    let mut found = Vec::new();
    walk(buf, 0, box_type, 0, &mut found);
    found
}

/// `buf` 内で最初に見つかった `box_type` 種別のボックスを返す
pub fn find_first(buf: &[u8], box_type: BoxType) -> Option<BoxRange> {
    find_boxes(buf, box_type).into_iter().next()
}

/// `buf` 内で最初に見つかった `box_type` 種別のボックスのペイロードを返す
pub fn find_payload(buf: &[u8], box_type: BoxType) -> Option<&[u8]> {
    find_first(buf, box_type).map(|b| b.slice(buf))
}

fn walk(buf: &[u8], base: u64, target: BoxType, depth: usize, found: &mut Vec<BoxRange>) {
    let mut offset = 0;
    while offset + BoxHeader::MIN_SIZE <= buf.len() {
        let Ok((header, header_size)) = BoxHeader::decode(&buf[offset..]) else {
            break;
        };
        let Some(payload_size) = header.payload_size() else {
            break;
        };

        let payload_start = offset + header_size;
        let payload_len = payload_size.min((buf.len() - payload_start) as u64) as usize;
        let range = BoxRange {
            box_type: header.box_type,
            payload_offset: base + payload_start as u64,
            payload_length: payload_len as u64,
        };

        if header.box_type == target {
            found.push(range);
        }
        if header.box_type.is_container() && depth < MAX_DEPTH {
            let payload = &buf[payload_start..payload_start + payload_len];
            walk(payload, range.payload_offset, target, depth + 1, found);
        }

        let next = (offset as u64).saturating_add(header.box_size.get());
        if next > buf.len() as u64 {
            break;
        }
        offset = next as usize;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_box(ty: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut b = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
        b.extend_from_slice(ty);
        b.extend_from_slice(payload);
        b
    }

    #[test]
    fn nested_offsets_are_translated() {
        let stsz = make_box(b"stsz", &[1, 2, 3, 4]);
        let stbl = make_box(b"stbl", &stsz);
        let mut buf = make_box(b"free", &[0; 4]);
        buf.extend(make_box(b"minf", &stbl));

        let found = find_boxes(&buf, BoxType::STSZ);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].slice(&buf), &[1, 2, 3, 4]);
        assert_eq!(found[0].payload_offset, 12 + 8 + 8 + 8);
    }

    #[test]
    fn non_container_is_not_descended() {
        let inner = make_box(b"stsz", &[0; 4]);
        let buf = make_box(b"udta", &inner);
        assert!(find_boxes(&buf, BoxType::STSZ).is_empty());
    }

    #[test]
    fn too_small_size_stops_the_level() {
        let mut buf = make_box(b"free", &[]);
        buf.extend_from_slice(&[0, 0, 0, 4, b's', b't', b's', b'z']);
        buf.extend(make_box(b"stsz", &[]));
        assert!(find_boxes(&buf, BoxType::STSZ).is_empty());
    }
}
