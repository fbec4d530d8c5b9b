//! Splicer: assembles the final audio around an insertion point.
//!
//! Two splice shapes are supported. [`insert_with_crossfade`] overlays the
//! promo on a (optionally ducked) window of the host so the output stays
//! roughly the host's length, which suits bed-style promos. [`insert_concat`]
//! opens the host at the point and pushes the tail out, growing the output
//! by the promo's length minus the crossfade overlap, which suits full ad
//! breaks.

use crate::buffer::SampleBuffer;
use crate::config::SpliceConfig;

/// Fade length applied to the ducked host window's edges.
const DUCK_FADE_MS: u64 = 100;

/// Lay the promo over a room-tone bed of its own length. The bed loops the
/// tone as needed and sits `gain_db` below unity (conventionally -26 dB) so
/// the insert never lands on dead air. `None` room tone passes the promo
/// through.
pub fn apply_room_tone(
    promo: &SampleBuffer,
    room_tone: Option<&SampleBuffer>,
    gain_db: f32,
) -> Result<SampleBuffer, String> {
    let Some(tone) = room_tone else {
        return Ok(promo.clone());
    };
    let bed = tone.loop_to_length_ms(promo.duration_ms()).gain_db(gain_db);
    bed.overlay(promo, 0)
}

/// Overlay-style splice: the promo plays over the host window it covers.
///
/// The host is cut into pre / mid / post at `insert_ms`, where mid spans the
/// promo's length. With `duck_db > 0` the mid window is attenuated by that
/// amount with short edge fades before the promo is overlaid; at 0 the promo
/// mixes straight over the host. The three pieces are rejoined with
/// crossfades clipped to the shorter neighbor, so the output runs the host's
/// length minus the crossfade overlap.
pub fn insert_with_crossfade(
    host: &SampleBuffer,
    promo: &SampleBuffer,
    insert_ms: u64,
    cfg: &SpliceConfig,
) -> Result<SampleBuffer, String> {
    let host_ms = host.duration_ms();
    let insert_ms = insert_ms.min(host_ms);
    let promo_ms = promo.duration_ms();

    let pre = host.slice_ms(0, insert_ms);
    let mut mid = host.slice_ms(insert_ms, insert_ms + promo_ms);
    let post = host.slice_ms(insert_ms + promo_ms, host_ms);

    if cfg.duck_db > 0.0 {
        mid = mid
            .gain_db(-cfg.duck_db)
            .fade_in_ms(DUCK_FADE_MS)
            .fade_out_ms(DUCK_FADE_MS);
    }
    let mid = mid.overlay(promo, 0)?;

    let merged = pre.append_crossfade(&mid, cfg.crossfade_ms)?;
    merged.append_crossfade(&post, cfg.crossfade_ms)
}

/// Concatenation-style splice: the host opens up and the promo plays in the
/// gap. Output duration is `host + promo - overlap` where overlap is at most
/// two crossfades, each clipped to its shorter neighbor. An insertion point
/// at or past the end of the host appends the promo.
pub fn insert_concat(
    host: &SampleBuffer,
    promo: &SampleBuffer,
    insert_ms: u64,
    cfg: &SpliceConfig,
) -> Result<SampleBuffer, String> {
    let host_ms = host.duration_ms();
    let insert_ms = insert_ms.min(host_ms);

    let pre = host.slice_ms(0, insert_ms);
    let post = host.slice_ms(insert_ms, host_ms);

    let merged = pre.append_crossfade(promo, cfg.crossfade_ms)?;
    if post.is_empty() {
        return Ok(merged);
    }
    merged.append_crossfade(&post, cfg.crossfade_ms)
}
