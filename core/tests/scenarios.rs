use hifitime::{Epoch, Unit};

use trajseg::{Config, InputError, Message, SegmentVariant, Segmenter};

fn msg(id: &str, ssvid: &str, t: Epoch, lon: f64, lat: f64, speed: f64, course: Option<f64>) -> Message {
    Message {
        msgid: id.into(),
        ssvid: ssvid.into(),
        timestamp: t,
        msg_type: "AIS.1".into(),
        lon: Some(lon),
        lat: Some(lat),
        course,
        speed: Some(speed),
        heading: None,
        shipname: None,
        callsign: None,
        imo: None,
        destination: None,
        length: None,
        width: None,
        receiver_type: None,
        source: None,
    }
}

fn info_msg(id: &str, ssvid: &str, t: Epoch, shipname: &str) -> Message {
    Message {
        msgid: id.into(),
        ssvid: ssvid.into(),
        timestamp: t,
        msg_type: "AIS.5".into(),
        lon: None,
        lat: None,
        course: None,
        speed: None,
        heading: None,
        shipname: Some(shipname.into()),
        callsign: None,
        imo: None,
        destination: None,
        length: None,
        width: None,
        receiver_type: None,
        source: None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Two vessels sharing one SSVID: a consistent extension joins the first
    /// segment, and a subsequent impossible jump opens a second one instead
    /// of corrupting the first.
    #[test]
    fn two_vessels_sharing_an_ssvid_split_into_two_segments() {
        let t0 = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
        let m1 = msg("m1", "1", t0, 0.0, 0.0, 10.0, Some(90.0));
        let m2 = msg("m2", "1", t0 + 1.0 * Unit::Hour, 10.0 / 60.0, 0.0, 10.0, Some(90.0));
        let m3 = msg("m3", "1", t0 + 1.0 * Unit::Hour + 1.0 * Unit::Second, 140.0, 30.0, 10.0, Some(90.0));

        let out: Vec<_> = Segmenter::new(vec![m1, m2, m3].into_iter(), Config::default())
            .collect::<Result<_, InputError>>()
            .expect("well-formed input");

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].variant, SegmentVariant::Closed);
        assert_eq!(out[0].msg_count(), 2);
        assert_eq!(out[1].variant, SegmentVariant::Closed);
        assert_eq!(out[1].msg_count(), 1);
        assert_eq!(out[1].first_msg().unwrap().msgid, "m3");
    }

    /// A winning `AIS.27` match that lands too close (in time) to the
    /// segment it matched is treated as noise: it's emitted as its own `Bad`
    /// singleton rather than extending the segment, which is left untouched.
    #[test]
    fn near_instant_type27_match_is_treated_as_noise() {
        let t0 = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
        let m1 = msg("m1", "1", t0, 0.0, 0.0, 10.0, Some(90.0));
        let mut m2 = msg("m2", "1", t0 + 10.0 * Unit::Minute, 10.0 / 360.0, 0.0, 10.0, Some(90.0));
        m2.msg_type = "AIS.27".into();

        let out: Vec<_> = Segmenter::new(vec![m1, m2].into_iter(), Config::default())
            .collect::<Result<_, InputError>>()
            .expect("well-formed input");

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].variant, SegmentVariant::Bad);
        assert_eq!(out[0].first_msg().unwrap().msgid, "m2");
        assert_eq!(out[1].variant, SegmentVariant::Closed);
        assert_eq!(out[1].msg_count(), 1);
        assert_eq!(out[1].first_msg().unwrap().msgid, "m1");
    }

    /// A legitimate track where message 3 is an outlier: message 4 matches
    /// back through the lookback window to message 2, and message 3 is
    /// marked `drop` and split off as a `Discarded` singleton.
    #[test]
    fn outlier_is_corrected_by_lookback_to_an_earlier_message() {
        let t0 = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
        let m1 = msg("m1", "1", t0, 0.0, 0.0, 20.0, Some(90.0));
        let m2 = msg("m2", "1", t0 + 1.0 * Unit::Hour, 20.0 / 60.0, 0.0, 20.0, Some(90.0));
        // A 24nm lateral outlier: feasible (just under max_knots * padded
        // hours) but barely so, giving it a tiny recorded match metric.
        let m3 = msg("m3", "1", t0 + 2.0 * Unit::Hour, 40.0 / 60.0, 0.4, 20.0, Some(90.0));
        // Resumes the track message 2 was actually on, ignoring message 3.
        let m4 = msg("m4", "1", t0 + 3.0 * Unit::Hour, 60.0 / 60.0, 0.0, 20.0, Some(90.0));

        let out: Vec<_> = Segmenter::new(vec![m1, m2, m3, m4].into_iter(), Config::default())
            .collect::<Result<_, InputError>>()
            .expect("well-formed input");

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].variant, SegmentVariant::Discarded);
        assert_eq!(out[0].first_msg().unwrap().msgid, "m3");

        assert_eq!(out[1].variant, SegmentVariant::Closed);
        assert_eq!(out[1].msg_count(), 3);
        let ids: Vec<&str> = out[1].messages().iter().map(|m| m.message.msgid.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m4"]);
    }

    /// An identity-bearing message associates with a position message that
    /// falls within its ping window, and the association survives into the
    /// finished segment's annotated messages.
    #[test]
    fn identity_message_annotates_a_nearby_position() {
        let t0 = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
        let info = info_msg("i1", "1", t0, "MV TEST");
        let pos = msg("p1", "1", t0 + 10.0 * Unit::Minute, 0.0, 0.0, 5.0, Some(90.0));

        let out: Vec<_> = Segmenter::new(vec![info, pos].into_iter(), Config::default())
            .collect::<Result<_, InputError>>()
            .expect("well-formed input");

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].variant, SegmentVariant::Info);

        assert_eq!(out[1].variant, SegmentVariant::Closed);
        let annotated = &out[1].messages()[0];
        assert_eq!(annotated.message.msgid, "p1");
        assert_eq!(annotated.identities.len(), 1);
        assert_eq!(annotated.identities[0].0.shipname.as_deref(), Some("MV TEST"));
        assert_eq!(annotated.identities[0].1, 1);
    }

    /// With `max_open_segments` capped, a third unrelated track forces the
    /// stalest open segment to close before the new one is created — the
    /// number of simultaneously open segments never exceeds the cap.
    #[test]
    fn max_open_segments_evicts_the_stalest_segment() {
        let t0 = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
        let m1 = msg("m1", "1", t0, 0.0, 0.0, 5.0, Some(90.0));
        let m2 = msg("m2", "1", t0 + 1.0 * Unit::Minute, 170.0, 80.0, 5.0, Some(90.0));
        let m3 = msg("m3", "1", t0 + 2.0 * Unit::Minute, -170.0, -80.0, 5.0, Some(90.0));

        let config = Config {
            max_open_segments: 2,
            ..Config::default()
        };
        let out: Vec<_> = Segmenter::new(vec![m1, m2, m3].into_iter(), config)
            .collect::<Result<_, InputError>>()
            .expect("well-formed input");

        assert_eq!(out.len(), 3);
        for segment in &out {
            assert_eq!(segment.variant, SegmentVariant::Closed);
            assert_eq!(segment.msg_count(), 1);
        }
        let ids: Vec<&str> = out.iter().map(|s| s.first_msg().unwrap().msgid.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
    }

    /// Splitting a stream at an arbitrary timestamp boundary — snapshotting
    /// the still-open segments' `SegmentState` and carrying them forward into
    /// a fresh `Segmenter` — reaches the same final message count as running
    /// the whole stream through in one pass.
    #[test]
    fn resume_matches_a_single_pass_run() {
        let t0 = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
        let m1 = msg("m1", "1", t0, 0.0, 0.0, 10.0, Some(90.0));
        let m2 = msg("m2", "1", t0 + 1.0 * Unit::Hour, 10.0 / 60.0, 0.0, 10.0, Some(90.0));
        let info = info_msg("i1", "1", t0 + 90.0 * Unit::Minute, "MV TEST");
        let m3 = msg("m3", "1", t0 + 2.0 * Unit::Hour, 20.0 / 60.0, 0.0, 10.0, Some(90.0));
        let m4 = msg("m4", "1", t0 + 3.0 * Unit::Hour, 30.0 / 60.0, 0.0, 10.0, Some(90.0));

        let single_pass: Vec<_> = Segmenter::new(
            vec![m1.clone(), m2.clone(), info.clone(), m3.clone(), m4.clone()].into_iter(),
            Config::default(),
        )
        .collect::<Result<_, InputError>>()
        .expect("well-formed input");
        assert_eq!(single_pass.len(), 2);
        let closed = single_pass.iter().find(|s| s.variant == SegmentVariant::Closed).unwrap();
        assert_eq!(closed.msg_count(), 4);

        // The host stops consuming after the info message surfaces, well
        // before the underlying stream (a stand-in for a long-running feed)
        // actually ends, and snapshots whatever is still open.
        let mut first_half = Segmenter::new(vec![m1, m2, info].into_iter(), Config::default());
        let first = first_half.next().expect("an item before the stream truly ends").expect("well-formed input");
        assert_eq!(first.variant, SegmentVariant::Info);
        let states = first_half.open_states();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].msg_count, 2);

        let resumed: Vec<_> = Segmenter::from_states(vec![m3, m4].into_iter(), Config::default(), states)
            .collect::<Result<_, InputError>>()
            .expect("well-formed input");

        assert_eq!(resumed.len(), 1);
        assert_eq!(resumed[0].variant, SegmentVariant::Closed);
        assert_eq!(resumed[0].msg_count(), closed.msg_count());

        let resumed_ids: Vec<&str> = resumed[0].messages().iter().map(|m| m.message.msgid.as_str()).collect();
        assert_eq!(resumed_ids, vec!["m3", "m4"]);
    }

    /// An out-of-order timestamp is the one fatal condition: the iterator
    /// yields an `Err` and stops producing segments after it.
    #[test]
    fn out_of_order_stream_yields_a_fatal_error() {
        let t0 = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
        let m1 = msg("m1", "1", t0, 0.0, 0.0, 5.0, Some(90.0));
        let m2 = msg("m2", "1", t0 - 1.0 * Unit::Hour, 0.0, 0.0, 5.0, Some(90.0));

        let segmenter = Segmenter::new(vec![m1, m2].into_iter(), Config::default());
        let results: Vec<_> = segmenter.collect();

        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(InputError::OutOfOrder { .. })));
    }
}
