/*!

This is the long-form manual for `election_join` and the `atlas` program.

An analysis reads a few result files, turns each of them into a table keyed by
a canonical key, joins the tables, derives new columns and attaches the result
to a boundary file. The whole analysis is described in a JSON configuration
file:

```text
atlas --config analysis.json --out results/
```

## Input formats

* `csv` Comma Separated Values. The first row is the header, unless the source
  provides `headers`.
* `xlsx` Excel workbooks. The worksheet is given by `worksheet`, or the first
  one is used.
* `nytHouse` The house results feed of the New York Times. Each race
  candidate becomes one row with the columns `state_id`, `seat`,
  `leader_party_id`, `party_id` and `votes`.

Columns are always addressed by their header name. `expectedColumns` and
`expectedColumnCount` reject files whose layout changed.

## Keys

A key is built from one or more columns. Each part goes through its own rules,
the parts are joined with the `separator` and the whole key goes through the
final `rules`.

| rule                    | effect                                           | example              |
|-------------------------|--------------------------------------------------|----------------------|
| `trim`                  | removes surrounding whitespace                   | ` NY ` -> `NY`       |
| `upper`                 | upper case                                       | `ny-al` -> `NY-AL`   |
| `zeroPad:N`             | left pads digits with zeros                      | `1001` -> `01001`    |
| `integer`               | reads an integral number below 2^53, no exponent | `1001.0` -> `1001`   |
| `takeAfter:SEP`         | keeps what follows the last separator            | `0500000US01001` -> `01001` with `US` |
| `stripPrefix:P`         | removes a leading prefix                         | `CD12` -> `12`       |
| `stateName`             | state name to code                               | `New York` -> `NY`   |
| `stateFips`             | state FIPS code to code                          | `36` -> `NY`         |
| `congressionalDistrict` | `ST-N` to `ST-NN`, at-large districts are `01`   | `AK-AL` -> `AK-01`   |

A precinct key such as `001/65` (election district, then assembly district) is
written:

```text
"key": {
  "parts": [
    {"column": "ED", "rules": ["integer", "zeroPad:3"]},
    {"column": "AD", "rules": ["integer"]}
  ],
  "separator": "/"
}
```

A row whose key cannot be built stops the analysis, unless the source sets
`skipInvalidKeys`.

## Shaping a source

* `filters` keep the rows whose column is `oneOf` a list of values, or is
  `notEmpty`.
* `columns` are either the `sum` of numeric columns (fusion lines) or a `text`
  column.
* `pivot` turns long rows into one column per group of labels, summing the
  values.
* `swap` exchanges two columns on the rows where the flag column is set: a
  non-zero number or `true`. Zero, `false` and blank cells leave the row alone,
  any other value is an error.
* `totalFilter` keeps the keys whose numeric total is within `min` and `max`.
* `excludeKeysContaining` drops the keys containing any of the given strings.

Rows sharing a key are aggregated: numbers are summed and text must agree.

## Joining

Source names must be unique. A column present in several sources is renamed
`column_source`. A name that is still taken afterwards is an error.

`join` is `inner` (the default: keys present in every source) or `outer` (all
the keys, missing values left empty).

## Metrics

| kind            | fields                                                       | output                          |
|-----------------|--------------------------------------------------------------|---------------------------------|
| `twoPartyShare` | `democrat`, `republican`                                     | percentage                      |
| `margin`        | `democrat`, `republican`                                     | percentage points               |
| `swing`         | `democratBefore`, `republicanBefore`, `democrat`, `republican` | change of share               |
| `lead`          | `democrat`, `republican`, `total`                            | lead over all the votes         |
| `winner`        | `democrat`, `republican`                                     | `democrat`, `republican` or `uncalled` |
| `plurality`     | `candidates`                                                 | the leading column, or `tie`    |
| `concordance`   | `democrat`, `republican`, `house`                            | `b`, `r`, `c`, `m` or `gray`    |
| `scaleByMax`    | `column`                                                     | value divided by the maximum    |
| `difference`    | `left`, `right`                                              | `left - right`                  |
| `ratio`         | `left`, optional `right`, `factor` (default 1)               | `left / right * factor`, or `left * factor` |

`regressions` fit `y` against `x` with a straight line. The fit needs at least
two distinct `x` values. With `residualOutput`, the studentized residuals are
added as a column.

## Outputs

* the joined table as CSV, with the key first
* a summary in JSON: fits, `summaries` (count, mean, standard deviation,
  extremes and percentiles), `sums` of numeric columns, optionally restricted
  with `where: {"column": .., "equals": ..}`, `counts` of the values of text columns and the
  `electoralVotes` won by each winner of a state-level column
* the boundary file with the rows merged in, when `geometry` is set

## Geometry

The boundary file is a GeoJSON feature collection. Its key is built from
feature properties. `insets` move features whose `property` equals `value`:
they are scaled about their centre, then translated. Without `insets`, Alaska
and Hawaii are moved the usual way for maps in the EPSG:2163 projection.

 */
