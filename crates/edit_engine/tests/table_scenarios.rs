//! End-to-end table editing scenarios
//!
//! Each test drives the editing engine the way a command layer would and
//! checks the content model, the frame layout and the undo stack together.

use doc_model::{BorderLine, BoxId, BoxSelection, Document, NodeId};
use edit_engine::{
    CommandOutcome, DeleteMode, EditingEngine, InsertRows, InsertTableOptions, MergeTables, Separator,
    SplitMode, SplitTable, TextToTable,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn engine_with_paragraphs(texts: &[&str]) -> EditingEngine {
    let mut doc = Document::new();
    let first = doc.nodes.at(1).unwrap();
    doc.nodes.text_mut(first).unwrap().text = texts[0].to_string();
    for text in &texts[1..] {
        doc.append_paragraph(text).unwrap();
    }
    EditingEngine::with_document(doc).unwrap()
}

fn box_texts(engine: &EditingEngine, table: NodeId) -> Vec<String> {
    let doc = engine.document();
    doc.leaf_boxes(table)
        .unwrap()
        .into_iter()
        .map(|b| doc.box_text(b).unwrap())
        .collect()
}

fn row_boxes(engine: &EditingEngine, table: NodeId, row: usize) -> Vec<BoxId> {
    let doc = engine.document();
    let line = doc.table(table).unwrap().lines[row];
    doc.line(line).unwrap().boxes.clone()
}

fn row_position(engine: &EditingEngine, table: NodeId, row: usize) -> usize {
    let first = row_boxes(engine, table, row)[0];
    engine.document().box_start_index(first).unwrap() + 1
}

#[test]
fn insert_three_by_three_at_document_start() {
    init_tracing();
    let mut engine = EditingEngine::new();
    let table = engine.insert_table(1, 3, 3, &InsertTableOptions::default()).unwrap();
    let doc = engine.document();

    assert_eq!(doc.nodes.node_at(1).map(|n| n.id()), Some(table));
    assert_eq!(doc.table(table).unwrap().row_count(), 3);
    let mut widths = Vec::new();
    for row in 0..3 {
        let boxes = row_boxes(&engine, table, row);
        assert_eq!(boxes.len(), 3);
        for b in boxes {
            widths.push(doc.table_box(b).unwrap().width());
            let paragraphs = doc.box_paragraphs(b).unwrap();
            assert_eq!(paragraphs.len(), 1);
            let text = doc.nodes.text(paragraphs[0]).unwrap();
            assert!(text.text.is_empty());
            assert_eq!(text.style.as_str(), "TableContents");
        }
    }
    assert!(widths.iter().all(|w| *w == u16::MAX as i64 / 3));
    assert!(3 * widths[0] <= u16::MAX as i64);
    assert_eq!(doc.table(table).unwrap().rows_to_repeat, 0);

    doc.check_table(table).unwrap();
    engine.layout().check_table_frames(doc, table).unwrap();
    assert_eq!(engine.undo_manager().undo_names(), vec!["Insert Table"]);
}

#[test]
fn text_to_table_and_back_with_tabs() {
    let mut engine = engine_with_paragraphs(&["A\tB", "C\tD"]);
    let source = engine.document().paragraph_texts();

    let command = TextToTable {
        start: 1,
        end: 2,
        separator: Separator::Tab,
        options: InsertTableOptions::default(),
    };
    let CommandOutcome::Table(table) = engine.execute(&command).unwrap() else {
        panic!("conversion produced no table");
    };
    assert_eq!(engine.document().table(table).unwrap().row_count(), 2);
    assert_eq!(row_boxes(&engine, table, 0).len(), 2);
    assert_eq!(box_texts(&engine, table), vec!["A", "B", "C", "D"]);
    engine.layout().check_table_frames(engine.document(), table).unwrap();

    let paragraphs = engine.table_to_text(table, '\t').unwrap();
    let doc = engine.document();
    let texts: Vec<&str> = paragraphs.iter().map(|p| doc.paragraph_text(*p).unwrap()).collect();
    assert_eq!(texts, vec!["A\tB", "C\tD"]);
    assert_eq!(doc.paragraph_texts(), source);
    assert!(doc.tables.is_empty());
}

#[test]
fn split_four_rows_with_border_copy() {
    init_tracing();
    let mut engine = EditingEngine::new();
    let options = InsertTableOptions::default().with_headline(1);
    let table = engine.insert_table(1, 4, 3, &options).unwrap();
    assert_eq!(engine.document().table(table).unwrap().rows_to_repeat, 1);

    let red = BorderLine::solid(30, "#C00000");
    for leaf in engine.document().leaf_boxes(table).unwrap() {
        engine.document_mut().box_format_mut(leaf).unwrap().borders.bottom = Some(red.clone());
    }
    let bottoms_before: Vec<Option<BorderLine>> = row_boxes(&engine, table, 1)
        .iter()
        .map(|b| engine.document().table_box(*b).unwrap().format.borders.bottom.clone())
        .collect();

    let command = SplitTable {
        position: row_position(&engine, table, 2),
        mode: SplitMode::BorderCopy,
        recalc_size: true,
    };
    let CommandOutcome::Table(second) = engine.execute(&command).unwrap() else {
        panic!("split produced no table");
    };
    let doc = engine.document();
    assert_eq!(doc.table(table).unwrap().row_count(), 2);
    assert_eq!(doc.table(second).unwrap().row_count(), 2);
    assert_eq!(doc.table(second).unwrap().rows_to_repeat, 0);
    assert_eq!(doc.table(table).unwrap().rows_to_repeat, 1);

    let first_new = row_boxes(&engine, second, 0);
    let tops: Vec<Option<BorderLine>> = first_new
        .iter()
        .map(|b| doc.table_box(*b).unwrap().format.borders.top.clone())
        .collect();
    assert_eq!(tops, bottoms_before);
    for b in &first_new {
        assert_eq!(doc.table_box(*b).unwrap().format.borders.bottom, Some(red.clone()));
    }
    doc.check_table(table).unwrap();
    doc.check_table(second).unwrap();
    engine.layout().check_table_frames(doc, table).unwrap();
    engine.layout().check_table_frames(doc, second).unwrap();

    // The two halves are adjacent and merge back
    let merge = MergeTables {
        position: row_position(&engine, second, 0),
        with_previous: true,
    };
    assert_eq!(engine.execute(&merge).unwrap(), CommandOutcome::Table(table));
    assert_eq!(engine.document().table(table).unwrap().row_count(), 4);
    assert_eq!(engine.undo_manager().undo_names().len(), 3);
}

#[test]
fn undo_walks_back_a_session() {
    init_tracing();
    let mut engine = EditingEngine::new();
    let start = engine.document().paragraph_texts();
    let table = engine.insert_table(1, 2, 2, &InsertTableOptions::default()).unwrap();
    let first = row_boxes(&engine, table, 0)[0];
    engine.set_box_text(first, "header").unwrap();

    let command = InsertRows {
        boxes: Some([first].into_iter().collect()),
        count: 2,
        behind: true,
    };
    engine.execute(&command).unwrap();
    let selection: BoxSelection = row_boxes(&engine, table, 3).into_iter().collect();
    engine.delete_rows_cols(&selection, DeleteMode::Rows).unwrap();
    assert_eq!(engine.document().table(table).unwrap().row_count(), 3);

    let names = engine.undo_manager().undo_names();
    assert_eq!(names, vec!["Delete Rows/Columns", "Insert Rows", "Typing", "Insert Table"]);
    for _ in 0..names.len() {
        engine.undo().unwrap();
    }
    assert!(engine.document().tables.is_empty());
    assert_eq!(engine.document().paragraph_texts(), start);
    assert!(!engine.can_undo());

    for _ in 0..names.len() {
        engine.redo().unwrap();
    }
    let doc = engine.document();
    assert_eq!(doc.table(table).unwrap().row_count(), 3);
    assert_eq!(doc.box_text(first).unwrap(), "header");
    engine.layout().check_table_frames(doc, table).unwrap();
}

#[test]
fn tracked_changes_record_table_edits() {
    let mut engine = EditingEngine::new();
    engine.redlines_mut().enable_tracking().unwrap();
    let table = engine.insert_table(1, 2, 2, &InsertTableOptions::default()).unwrap();
    assert_eq!(engine.redlines().len(), 1);

    engine.delete_table(table).unwrap();
    // The table stays until the deletion is accepted
    assert!(engine.document().tables.contains_key(&table));
    assert_eq!(engine.redlines().len(), 2);
}

#[test]
fn table_to_text_keeps_inner_table() {
    init_tracing();
    let mut engine = EditingEngine::new();
    let outer = engine.insert_table(1, 2, 2, &InsertTableOptions::default()).unwrap();
    for (leaf, text) in engine.document().leaf_boxes(outer).unwrap().into_iter().zip(["a", "b", "c", "d"]) {
        engine.set_box_text(leaf, text).unwrap();
    }
    let host = row_boxes(&engine, outer, 0)[1];
    let at = engine.document().box_start_index(host).unwrap() + 1;
    let inner = engine.insert_table(at, 1, 2, &InsertTableOptions::default()).unwrap();
    assert_eq!(engine.document().tables.len(), 2);

    let paragraphs = engine.table_to_text(outer, '\t').unwrap();
    let doc = engine.document();
    let texts: Vec<&str> = paragraphs.iter().map(|p| doc.paragraph_text(*p).unwrap()).collect();
    // The inner table breaks the line, so "b" stays on its own
    assert_eq!(texts, vec!["a", "b", "c\td"]);
    assert!(!doc.tables.contains_key(&outer));
    assert_eq!(doc.tables.len(), 1);
    let (start, _) = doc.table_range(inner).unwrap();
    assert_eq!(doc.nodes.index_of(paragraphs[0]), Some(start - 1));
    assert_eq!(doc.leaf_boxes(inner).unwrap().len(), 2);
    doc.check_table(inner).unwrap();
    engine.layout().check_table_frames(doc, inner).unwrap();
    for p in &paragraphs {
        assert!(engine.layout().frame_of(*p).is_some());
    }

    engine.undo().unwrap();
    let doc = engine.document();
    assert_eq!(doc.tables.len(), 2);
    assert!(doc.tables.contains_key(&outer));
    assert_eq!(doc.table(outer).unwrap().row_count(), 2);
}
