use ndarray::Array2;

/// Binary dilation with a `side x side` square of ones.
///
/// Even sides reach one pixel further up/left than down/right.
pub fn dilate_square(mask: &Array2<bool>, side: usize) -> Array2<bool> {
    if side == 0 {
        return Array2::from_elem(mask.dim(), false);
    }
    let before = (side / 2) as i32;
    let after = ((side - 1) / 2) as i32;
    dilate_with(mask, before, after, |_, _| true)
}

/// Binary dilation with a disk of the given radius (`dr² + dc² <= r²`).
pub fn dilate_disk(mask: &Array2<bool>, radius: usize) -> Array2<bool> {
    let r = radius as i32;
    dilate_with(mask, r, r, |dr, dc| dr * dr + dc * dc <= r * r)
}

/// A pixel becomes true if any true pixel lies at an offset inside the footprint.
///
/// Footprint offsets span `[-after, before]` in both axes, mirrored so that a
/// set pixel spreads `before` pixels up/left and `after` pixels down/right.
fn dilate_with<F>(mask: &Array2<bool>, before: i32, after: i32, inside: F) -> Array2<bool>
where
    F: Fn(i32, i32) -> bool,
{
    let (h, w) = mask.dim();
    let mut result = Array2::from_elem((h, w), false);

    for row in 0..h {
        for col in 0..w {
            let mut any_true = false;
            'search: for dr in -after..=before {
                for dc in -after..=before {
                    if !inside(dr, dc) {
                        continue;
                    }
                    let nr = row as i32 + dr;
                    let nc = col as i32 + dc;
                    if nr >= 0
                        && nr < h as i32
                        && nc >= 0
                        && nc < w as i32
                        && mask[[nr as usize, nc as usize]]
                    {
                        any_true = true;
                        break 'search;
                    }
                }
            }
            result[[row, col]] = any_true;
        }
    }

    result
}
