//! 抽出から照合までの一気通貫テスト (メモリ内ドキュメント)

use tender_recon_rust::extract::{
    BorderStyle, Cell, GridDocument, GridPage, GridTable, Workbook, Worksheet,
};
use tender_recon_rust::models::ComparisonStatus;
use tender_recon_rust::service::{ExtractionCache, ExtractionParams, ExtractionService, Matcher};
use tender_recon_rust::ReconError;

fn grid_row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|s| s.to_string()).collect()
}

fn cell(v: &str) -> Cell {
    Cell::text(v)
}

fn cell_hair(v: &str) -> Cell {
    Cell {
        value: v.to_string(),
        border_top: BorderStyle::None,
        border_bottom: BorderStyle::Hair,
    }
}

fn pdf_document() -> GridDocument {
    GridDocument {
        pages: vec![
            GridPage {
                page_number: 1,
                tables: vec![GridTable {
                    rows: vec![
                        grid_row(&["名称", "数量", "単位", "摘要"]),
                        grid_row(&["土工 掘削", "10", "m3", ""]),
                        grid_row(&["コンクリート工", "5", "m3", "単1号"]),
                    ],
                }],
            },
            GridPage {
                page_number: 2,
                tables: vec![GridTable {
                    rows: vec![
                        grid_row(&["単1号", "", "", ""]),
                        grid_row(&["名称", "数量", "単位", "摘要"]),
                        grid_row(&["生コンクリート", "2.5", "m3", ""]),
                        grid_row(&["型枠", "", "", ""]),
                        grid_row(&["", "12", "m2", ""]),
                        grid_row(&["合計", "", "", ""]),
                    ],
                }],
            },
        ],
    }
}

fn workbook() -> Workbook {
    Workbook {
        sheets: vec![
            Worksheet {
                name: "本工事内訳書".to_string(),
                rows: vec![
                    vec![cell("名称"), cell("数量"), cell("単位"), cell("摘要")],
                    vec![
                        cell_hair("土工 掘削"),
                        cell_hair("10"),
                        cell_hair("m3"),
                        cell_hair(""),
                    ],
                    vec![
                        cell_hair("コンクリート工"),
                        cell_hair("7"),
                        cell_hair("m2"),
                        cell_hair("単1号"),
                    ],
                ],
            },
            Worksheet {
                name: "単価表".to_string(),
                rows: vec![
                    vec![cell("単1号"), cell(""), cell(""), cell("")],
                    vec![cell("名称"), cell("数量"), cell("単位"), cell("摘要")],
                    vec![cell("生コンクリート"), cell("2.5"), cell("m3"), cell("")],
                    vec![cell("型枠"), cell("12"), cell("m2"), cell("")],
                ],
            },
        ],
    }
}

fn params() -> ExtractionParams {
    ExtractionParams {
        main_page_start: 1,
        main_page_end: 1,
        subtable_page_start: 2,
        subtable_page_end: 2,
        main_sheet: "本工事内訳書".to_string(),
    }
}

#[test]
fn full_pipeline_comparison() {
    let service = ExtractionService::new();
    let bundle = service
        .extract_all(&pdf_document(), &workbook(), &params())
        .expect("extraction should succeed");

    assert_eq!(bundle.pdf_items.len(), 2);
    assert_eq!(bundle.excel_items.len(), 2);
    assert_eq!(bundle.pdf_subtables.len(), 2);
    assert_eq!(bundle.excel_subtables.len(), 2);

    let matcher = Matcher::new();
    let summary = matcher.compare_main_tables(&bundle.pdf_items, &bundle.excel_items);
    assert_eq!(summary.results[0].status, ComparisonStatus::Ok);
    assert_eq!(summary.results[1].status, ComparisonStatus::QuantityMismatch);
    assert_eq!(summary.results[1].quantity_difference, Some(2.0));
    assert_eq!(summary.results[1].unit_mismatch, Some(true));

    let sub_results = matcher.compare_subtables(&bundle.pdf_subtables, &bundle.excel_subtables);
    assert_eq!(sub_results.len(), 2);
    assert!(sub_results
        .iter()
        .all(|r| r.status == ComparisonStatus::Ok));

    let extras = matcher.extra_items_simplified(&bundle.pdf_items, &bundle.excel_items);
    assert!(extras.is_empty());
}

#[test]
fn session_cache_roundtrip_supports_repeated_comparison() {
    let service = ExtractionService::new();
    let bundle = service
        .extract_all(&pdf_document(), &workbook(), &params())
        .expect("extraction should succeed");

    let cache = ExtractionCache::new(30);
    let session_id = cache.put(bundle);

    let matcher = Matcher::new();
    for _ in 0..2 {
        let bundle = cache.get(&session_id).expect("session should be alive");
        let summary = matcher.compare_main_tables(&bundle.pdf_items, &bundle.excel_items);
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.quantity_mismatches, 1);
    }
    assert!(cache.remove(&session_id));
    assert!(cache.get(&session_id).is_none());
}

#[test]
fn missing_sheet_propagates_with_available_names() {
    let service = ExtractionService::new();
    let mut p = params();
    p.main_sheet = "別のシート".to_string();
    let err = service
        .extract_all(&pdf_document(), &workbook(), &p)
        .unwrap_err();
    match err {
        ReconError::SheetNotFound { requested, available } => {
            assert_eq!(requested, "別のシート");
            assert!(available.contains(&"本工事内訳書".to_string()));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn invalid_page_range_propagates() {
    let service = ExtractionService::new();
    let mut p = params();
    p.main_page_start = 0;
    let err = service
        .extract_all(&pdf_document(), &workbook(), &p)
        .unwrap_err();
    assert!(matches!(err, ReconError::InvalidPageRange { .. }));
}
