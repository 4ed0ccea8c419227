use env_logger::Env;
use log::info;
use otty_ui_compressible_tree::{
    CompressibleObjectTreeModel, CompressibleObjectTreeModelOptions, Result,
    TreeElement, natural_sorter,
};

fn dir(name: &str, children: Vec<TreeElement<String>>) -> TreeElement<String> {
    TreeElement::new(name.to_owned()).with_children(children)
}

fn file(name: &str) -> TreeElement<String> {
    TreeElement::new(name.to_owned())
}

fn print_rows(model: &CompressibleObjectTreeModel<String>) {
    for row in model.visible_rows() {
        let label = row
            .compressed()
            .map(|node| node.elements().join("/"))
            .unwrap_or_default();
        let marker = match (row.collapsible(), row.collapsed()) {
            (false, _) => ' ',
            (true, false) => 'v',
            (true, true) => '>',
        };
        println!("{}{marker} {label}", "  ".repeat(row.depth() - 1));
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("debug"))
        .format_timestamp_millis()
        .init();

    let mut model = CompressibleObjectTreeModel::new(
        CompressibleObjectTreeModelOptions {
            user: String::from("explorer"),
            sorter: Some(natural_sorter()),
            ..Default::default()
        },
    );
    let events = model.subscribe();

    model.set_children(
        None,
        vec![
            dir(
                "crates",
                vec![dir(
                    "tree",
                    vec![dir(
                        "src",
                        vec![file("lib10.rs"), file("lib2.rs"), file("lib.rs")],
                    )],
                )],
            ),
            dir("docs", vec![file("guide.md")]),
            file("Cargo.toml"),
        ],
    )?;

    println!("compressed:");
    print_rows(&model);

    model.set_collapsed(Some(&String::from("src")), Some(true), false)?;
    println!("\ncollapsed src:");
    print_rows(&model);

    model.set_compression_enabled(false)?;
    println!("\nuncompressed:");
    print_rows(&model);

    for event in events.drain() {
        info!("event: {event:?}");
    }
    Ok(())
}
