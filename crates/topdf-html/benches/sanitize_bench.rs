//! Benchmarks for HTML sanitizing and nested-table resolution.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use topdf_html::{clean_html, resolve_nested_tables, HtmlTree};

/// A page with `sections` headed sections, each with a styled paragraph and a
/// table nested `depth` levels deep.
fn make_page(sections: usize, depth: usize) -> String {
    let mut html = String::from(
        "<!DOCTYPE html><html><head><title>Bench</title>\
         <style>td { padding: 2px; }</style><script>var x = 1;</script></head><body>",
    );
    for i in 0..sections {
        html.push_str(&format!(
            "<div class=\"section\"><h2 id=\"s{i}\">Section {i}</h2>\
             <p style=\"margin:0\">Paragraph with <span>inline</span> &amp; <i>markup</i> {i}.</p>",
        ));
        for level in 0..depth {
            html.push_str(&format!("<table border=\"1\"><tr><td>level {level}</td><td>"));
        }
        html.push_str("leaf");
        for _ in 0..depth {
            html.push_str("</td></tr></table>");
        }
        html.push_str("</div>");
    }
    html.push_str("</body></html>");
    html
}

fn bench_clean_html(c: &mut Criterion) {
    let mut group = c.benchmark_group("CleanHtml");
    for n in [10, 100, 500] {
        let page = make_page(n, 2);
        group.bench_function(format!("{}_sections", n), |b| {
            b.iter(|| clean_html(black_box(&page)))
        });
    }
    group.finish();
}

fn bench_nested_tables(c: &mut Criterion) {
    let mut group = c.benchmark_group("NestedTables");
    for depth in [2, 5, 10] {
        let page = make_page(50, depth);
        let tree = HtmlTree::parse(&page);
        group.bench_function(format!("50_sections_depth_{}", depth), |b| {
            b.iter(|| {
                let mut tree = tree.clone();
                resolve_nested_tables(black_box(&mut tree))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_clean_html, bench_nested_tables);
criterion_main!(benches);
