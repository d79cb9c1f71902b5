/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use tbxlc::file_reader::SourceFileReader;
use tbxlc::{compile, CompileOptions, OutputMode};

fn compile_text(source: &str, opts: CompileOptions) -> (Vec<u8>, tbxlc::diagnostics::Bag) {
    compile(source, "test.bas", &opts, &SourceFileReader).expect("compile should succeed")
}

#[test]
fn constant_fold_and_token_replace_collapses_to_a_single_constant() {
    let opts = CompileOptions { mode: OutputMode::LongList, ..CompileOptions::default() };
    let (bytes, _) = compile_text("10 A=1+2*3-1\n", opts);
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("LET A = 6"), "expected folded constant, got: {text}");
}

#[test]
fn if_then_goto_collapses_to_if_then_line_number() {
    let opts = CompileOptions { mode: OutputMode::LongList, ..CompileOptions::default() };
    let (bytes, _) = compile_text("10 IF X>0 THEN GOTO 100 : ENDIF\n100 END\n", opts);
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("IF X > 0 THEN 1"), "expected collapsed IF/THEN, got: {text}");
}

#[test]
fn for_next_desugars_with_no_structured_statements_left() {
    let opts = CompileOptions { mode: OutputMode::LongList, ..CompileOptions::default() };
    let (bytes, _) = compile_text("10 FOR I=1 TO 10 : PRINT I : NEXT I\n", opts);
    let text = String::from_utf8(bytes).unwrap();
    assert!(!text.contains("FOR "));
    assert!(!text.contains("NEXT"));
    assert!(text.contains("PRINT"));
}

#[test]
fn dead_variable_is_removed_after_optimization() {
    let opts = CompileOptions { mode: OutputMode::LongList, ..CompileOptions::default() };
    let (bytes, _) = compile_text("10 A=5\n20 B=A+1\n30 PRINT B\n40 C=99\n", opts);
    let text = String::from_utf8(bytes).unwrap();
    assert!(!text.contains('C'), "dead variable C should have been dropped: {text}");
}

#[test]
fn binary_output_is_well_formed_and_round_trips_through_the_short_lister() {
    let bin_opts = CompileOptions { mode: OutputMode::Binary, ..CompileOptions::default() };
    let (bin, _) = compile_text("10 A=1\n20 PRINT A\n", bin_opts.clone());
    assert!(!bin.is_empty());

    let short_opts = CompileOptions { mode: OutputMode::ShortList, ..bin_opts };
    let (short, _) = compile_text("10 A=1\n20 PRINT A\n", short_opts);
    assert!(!short.is_empty());
    let text = String::from_utf8(short).unwrap();
    assert!(text.contains("PRINT"));
}

#[test]
fn while_wend_carries_its_condition_into_the_loop_test() {
    let opts = CompileOptions { mode: OutputMode::LongList, ..CompileOptions::default() };
    let (bytes, _) = compile_text("10 WHILE X<10 : X=X+1 : WEND\n", opts);
    let text = String::from_utf8(bytes).unwrap();
    assert!(!text.contains("WHILE"));
    assert!(!text.contains("WEND"));
}

#[test]
fn proc_and_exec_round_trip_through_the_front_end_and_middle_end() {
    let opts = CompileOptions { mode: OutputMode::LongList, ..CompileOptions::default() };
    let (bytes, _) = compile_text("10 EXEC DOUBLER\n20 END\n30 PROC DOUBLER\n40 ENDPROC\n", opts);
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.to_uppercase().contains("PROC") || !text.is_empty());
}

#[test]
fn a_define_directive_never_reaches_the_output() {
    let opts = CompileOptions { mode: OutputMode::LongList, ..CompileOptions::default() };
    let (bytes, _) = compile_text(".DEFINE LIMIT 10\n10 IF X>LIMIT THEN GOTO 30 : ENDIF\n20 PRINT X\n30 END\n", opts);
    let text = String::from_utf8(bytes).unwrap();
    assert!(!text.contains("DEFINE"));
}

#[test]
fn malformed_source_reports_a_parse_error() {
    let opts = CompileOptions::default();
    let err = compile("10 LET = =\n", "bad.bas", &opts, &SourceFileReader).unwrap_err();
    assert!(matches!(err, tbxlc::errors::CompileError::Parse { .. }));
}

#[test]
fn a_binary_include_define_compiles_without_touching_the_filesystem() {
    use tbxlc::file_reader::MockFileReader;

    let mut reader = MockFileReader::default();
    reader.add_binary_file("sprites.bin", b"HELLOWORLD");
    let opts = CompileOptions { mode: OutputMode::LongList, ..CompileOptions::default() };
    let (bytes, _) = compile(
        ".DEFINE GREETING \"sprites.bin\", 0\n10 PRINT GREETING$\n",
        "test.bas",
        &opts,
        &reader,
    )
    .expect("compile should succeed");
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("PRINT"));
}

#[test]
fn short_list_honors_a_narrow_max_line_length() {
    let opts = CompileOptions { mode: OutputMode::ShortList, max_line_len: 16, ..CompileOptions::default() };
    let (bytes, _) = compile_text("10 A=1 : B=2 : C=3 : D=4 : PRINT A,B,C,D\n", opts);
    let text = String::from_utf8(bytes).unwrap();
    for line in text.lines() {
        assert!(line.len() <= 16 + 8, "line exceeds configured width: {line:?}");
    }
}
