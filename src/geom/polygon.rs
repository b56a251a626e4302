/// Ray-casting parity test: is `(x, y)` inside the closed polygon `vertices`?
///
/// The polygon closes implicitly from the last vertex back to the first.
/// Points exactly on an edge may land on either side.
pub fn contains(vertices: &[(f64, f64)], x: f64, y: f64) -> bool {
    if vertices.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let (xi, yi) = vertices[i];
        let (xj, yj) = vertices[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}
