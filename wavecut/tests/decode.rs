// Copyright 2024 The Regents of the University of California
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@berkeley.edu>

use wavecut::*;

#[test]
fn test_decode_cpu() {
    let trace = decode_file("inputs/cpu.vcd", &LoadOptions::default()).expect("failed to parse");
    let h = &trace.hierarchy;
    assert_eq!(h.date(), "Mon Oct 19 10:00:00 2026");
    assert_eq!(h.version(), "Icarus Verilog");
    assert_eq!(h.comments(), ["small cpu with a memory port"]);
    assert_eq!(
        trace.timescale(),
        Some(Timescale::new(10, TimescaleUnit::PicoSeconds))
    );
    assert_eq!(trace.begin_time, 0);
    assert_eq!(trace.end_time, 30);

    let top = h.first_scope().unwrap();
    assert_eq!(top.name(), "top");
    assert_eq!(h.instances(), ["top", "top.cpu", "top.mem"]);
    let data = h.lookup_var(&["top", "cpu"], &"data[7:0]").unwrap();
    assert_eq!(h[data].full_name(h), "top.cpu.data[7:0]");
    assert_eq!(h[data].width(), 8);

    let s = &trace.signals;
    // `top.clk` and `top.mem.clk` share an identifier
    assert_eq!(s.len(), 7);
    assert_eq!(s.references().len(), 8);
    assert_eq!(s.lookup_ref("top.clk"), s.lookup_ref("top.mem.clk"));
    assert_eq!(s.by_identifier("!").unwrap().references(), ["top.clk", "top.mem.clk"]);
    assert_eq!(s.matching("clk"), ["top.clk", "top.mem.clk"]);
}

#[test]
fn test_point_queries() {
    let trace = decode_file("inputs/cpu.vcd", &LoadOptions::default()).unwrap();
    let data = trace.signals.lookup("top.cpu.data[7:0]").unwrap();
    assert!(data.value_at(0).unwrap().is_unknown());
    assert_eq!(data.value_at(7).unwrap().as_str(), "00000001");
    assert_eq!(data.value_at(19).unwrap().as_str(), "00000010");
    assert_eq!(data.value_at(1000).unwrap().as_str(), "00000011");
    // negative times clamp to zero
    assert!(data.value_at(-5).unwrap().is_unknown());

    let temp = trace.signals.lookup("top.cpu.temp").unwrap();
    assert!(temp.value_at(21).unwrap().is_real());
    assert_eq!(temp.value_at(21).unwrap().as_str(), "1.25");

    let valid = trace.signals.lookup("top.cpu.valid").unwrap();
    let dense: Vec<_> = valid
        .values_over(8..12)
        .into_iter()
        .map(|v| v.map(|v| v.to_string()))
        .collect();
    assert_eq!(dense, [Some("0"), Some("0"), Some("1"), Some("1")].map(|v| v.map(String::from)));
}

#[test]
fn test_allow_list() {
    let options = LoadOptions {
        signals: vec!["top.cpu.valid".to_string(), "top.mem.clk".to_string()],
        ..Default::default()
    };
    let trace = decode_file("inputs/cpu.vcd", &options).unwrap();
    assert_eq!(trace.signals.references(), ["top.cpu.valid", "top.mem.clk"]);
    assert!(trace.signals.lookup("top.clk").is_none());
    // the alias still receives all changes of its identifier
    assert_eq!(trace.signals.lookup("top.mem.clk").unwrap().changes().len(), 7);
    assert_eq!(trace.end_time, 30);
}

#[test]
fn test_without_values() {
    let options = LoadOptions {
        store_values: false,
        ..Default::default()
    };
    let trace = decode_file("inputs/cpu.vcd", &options).unwrap();
    let addr = trace.signals.lookup("top.mem.addr[3:0]").unwrap();
    assert!(addr.changes().is_empty());
    assert_eq!(addr.last_value().unwrap().as_str(), "0010");
}

#[test]
fn test_missing_file() {
    let r = decode_file("inputs/does_not_exist.vcd", &LoadOptions::default());
    assert!(matches!(r, Err(VcdParseError::SourceUnavailable(_, _))));
}

#[test]
fn test_malformed_inputs() {
    let options = LoadOptions::default();
    let r = decode_str("$timescale 1 parsec $end\n$enddefinitions $end\n", &options);
    assert!(matches!(r, Err(VcdParseError::MalformedTimescale(_))));

    let r = decode_str("$scope module top $end\n$var wire 1 ! a\n", &options);
    assert!(matches!(r, Err(VcdParseError::MalformedHeader(_))));

    let input = "$scope module t $end\n$var wire 2 ! a $end\n$upscope $end\n$enddefinitions $end\n#0 b01 !\n";
    let r = decode_str(input, &options);
    assert!(matches!(r, Err(VcdParseError::VectorMustBeOnOwnLine(_))));
}

#[test]
fn test_decode_bursts() {
    let trace = decode_file("inputs/bursts.vcd", &LoadOptions::default()).unwrap();
    assert_eq!(trace.begin_time, 0);
    assert_eq!(trace.end_time, 501);
    let ack = trace.signals.lookup("tb.dut.ack").unwrap();
    let times: Vec<Time> = ack.changes().iter().map(|c| c.time).collect();
    assert_eq!(times, [0, 3, 4, 101, 103, 501]);
    assert_eq!(
        trace.timescale().unwrap().seconds_per_tick(),
        Decimal::new(1, -9)
    );
}
