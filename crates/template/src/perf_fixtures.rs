pub const BLOCK_TEMPLATE: &str = concat!(
    "<div class=\"row\">\n",
    "  <ten:if expr=\"item.visible\">\n",
    "    <span>&ten.item.name;</span>\n",
    "    <ten:echo data=\"item.price\" escape=\"html\"/>\n",
    "  </ten:if>\n",
    "</div>\n"
);

pub fn make_blocks(blocks: usize) -> String {
    let mut source = String::with_capacity(BLOCK_TEMPLATE.len() * blocks + 32);
    source.push_str("<ten:root>\n");
    for _ in 0..blocks {
        source.push_str(BLOCK_TEMPLATE);
    }
    source.push_str("</ten:root>");
    source
}

/// Text-heavy input with markup-like bytes that never form template tags.
pub fn make_literal_noise(bytes: usize) -> String {
    let mut source = String::with_capacity(bytes + 32);
    while source.len() < bytes {
        source.push_str("<ten: a & b <!--[if x]> &ten. </ten:");
    }
    source
}
