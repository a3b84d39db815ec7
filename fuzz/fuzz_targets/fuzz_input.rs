// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use std::sync::Arc;

use docsentry::agents::anomaly::parse_anomaly_reply;
use docsentry::agents::entities::durations;
use docsentry::agents::{AnomalyDetector, DocumentType, PatternRecognizer};
use docsentry::llm::DisabledGenerator;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let mut entities = PatternRecognizer::new().extract(text);
    entities.extend(durations(text));
    for entity in &entities {
        assert!(text.contains(entity.value.split_whitespace().next().unwrap_or("")));
    }

    let detector = AnomalyDetector::new(Arc::new(DisabledGenerator), String::new(), 4096, 9)
        .expect("static rule compiles");
    let _ = detector.rule_based_check(text, &entities);
    let _ = parse_anomaly_reply(text);
    let _ = DocumentType::from_label(text);
    let _ = DocumentType::guess_from_text(text);
});
